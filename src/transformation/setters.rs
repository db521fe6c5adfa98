//! The closed set of transformation setters
//!
//! Every named setter is a [`ParamName`] variant. String keys (snake_case or
//! camelCase) resolve through a lookup table built once, and each variant
//! knows the [`Param`] it installs.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;

use super::Transformation;
use crate::param::{Param, ParamSpec, Process};

macro_rules! param_names {
    ($($variant:ident => $name:literal, $camel:literal;)*) => {
        /// A transformation setter.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ParamName {
            $($variant),*
        }

        impl ParamName {
            pub const ALL: &'static [ParamName] = &[$(ParamName::$variant),*];

            /// snake_case name, also the storage key of the installed parameter
            pub fn name(self) -> &'static str {
                match self {
                    $(ParamName::$variant => $name),*
                }
            }

            /// camelCase lookup key
            pub fn camel_name(self) -> &'static str {
                match self {
                    $(ParamName::$variant => $camel),*
                }
            }
        }
    };
}

param_names! {
    Angle => "angle", "angle";
    AudioCodec => "audio_codec", "audioCodec";
    AudioFrequency => "audio_frequency", "audioFrequency";
    AspectRatio => "aspect_ratio", "aspectRatio";
    Background => "background", "background";
    BitRate => "bit_rate", "bitRate";
    Border => "border", "border";
    Color => "color", "color";
    ColorSpace => "color_space", "colorSpace";
    Crop => "crop", "crop";
    DefaultImage => "default_image", "defaultImage";
    Delay => "delay", "delay";
    Density => "density", "density";
    Duration => "duration", "duration";
    Dpr => "dpr", "dpr";
    Effect => "effect", "effect";
    Else => "else", "else";
    EndIf => "end_if", "endIf";
    EndOffset => "end_offset", "endOffset";
    FallbackContent => "fallback_content", "fallbackContent";
    FetchFormat => "fetch_format", "fetchFormat";
    Format => "format", "format";
    Flags => "flags", "flags";
    Gravity => "gravity", "gravity";
    Fps => "fps", "fps";
    Height => "height", "height";
    HtmlHeight => "html_height", "htmlHeight";
    HtmlWidth => "html_width", "htmlWidth";
    If => "if", "if";
    KeyframeInterval => "keyframe_interval", "keyframeInterval";
    Offset => "offset", "offset";
    Opacity => "opacity", "opacity";
    Overlay => "overlay", "overlay";
    Page => "page", "page";
    Poster => "poster", "poster";
    Prefix => "prefix", "prefix";
    Quality => "quality", "quality";
    Radius => "radius", "radius";
    RawTransformation => "raw_transformation", "rawTransformation";
    Size => "size", "size";
    SourceTypes => "source_types", "sourceTypes";
    SourceTransformation => "source_transformation", "sourceTransformation";
    StartOffset => "start_offset", "startOffset";
    StreamingProfile => "streaming_profile", "streamingProfile";
    Transformation => "transformation", "transformation";
    Underlay => "underlay", "underlay";
    Variables => "variables", "variables";
    VideoCodec => "video_codec", "videoCodec";
    VideoSampling => "video_sampling", "videoSampling";
    Width => "width", "width";
    X => "x", "x";
    Y => "y", "y";
    Zoom => "zoom", "zoom";
}

fn lookup_table() -> &'static HashMap<&'static str, ParamName> {
    static TABLE: OnceLock<HashMap<&'static str, ParamName>> = OnceLock::new();
    TABLE.get_or_init(|| ParamName::ALL.iter().map(|name| (name.camel_name(), *name)).collect())
}

impl ParamName {
    /// Resolve a camelCase key.
    pub fn lookup(camel_key: &str) -> Option<ParamName> {
        lookup_table().get(camel_key).copied()
    }

    /// The parameter this setter installs, or `None` for setters that
    /// rewrite into other setters or drive conditional control flow.
    pub fn param(self) -> Option<Param> {
        use ParamSpec::*;
        use Process::*;

        let (code, spec, process) = match self {
            Self::Angle => (Some("a"), Array { sep: "." }, Expression),
            Self::AudioCodec => (Some("ac"), Scalar, Identity),
            Self::AudioFrequency => (Some("af"), Scalar, Identity),
            Self::AspectRatio => (Some("ar"), Scalar, Expression),
            Self::Background => (Some("b"), Scalar, Color),
            Self::BitRate => (Some("br"), Scalar, Identity),
            Self::Border => (Some("bo"), Scalar, Process::Border),
            Self::Color => (Some("co"), Scalar, Process::Color),
            Self::ColorSpace => (Some("cs"), Scalar, Identity),
            Self::Crop => (Some("c"), Scalar, Identity),
            Self::DefaultImage => (Some("d"), Scalar, Identity),
            Self::Delay => (Some("dl"), Scalar, Identity),
            Self::Density => (Some("dn"), Scalar, Identity),
            Self::Duration => (Some("du"), Scalar, Range),
            Self::Dpr => (Some("dpr"), Scalar, Process::Dpr),
            Self::Effect => (Some("e"), Array { sep: ":" }, Expression),
            Self::EndOffset => (Some("eo"), Scalar, Range),
            Self::FallbackContent => (None, Scalar, Identity),
            Self::FetchFormat => (Some("f"), Scalar, Identity),
            Self::Format => (None, Scalar, Identity),
            Self::Flags => (Some("fl"), Array { sep: "." }, Identity),
            Self::Gravity => (Some("g"), Scalar, Identity),
            Self::Fps => (Some("fps"), Scalar, Process::Fps),
            Self::Height => (Some("h"), Scalar, Dimension),
            Self::HtmlHeight => (None, Scalar, Identity),
            Self::HtmlWidth => (None, Scalar, Identity),
            Self::KeyframeInterval => (Some("ki"), Scalar, Identity),
            Self::Opacity => (Some("o"), Scalar, Expression),
            Self::Overlay => (Some("l"), ParamSpec::Layer, Identity),
            Self::Page => (Some("pg"), Scalar, Identity),
            Self::Poster => (None, Scalar, Identity),
            Self::Prefix => (Some("p"), Scalar, Identity),
            Self::Quality => (Some("q"), Scalar, Expression),
            Self::Radius => (Some("r"), Scalar, Expression),
            Self::RawTransformation => (None, Raw, Identity),
            Self::SourceTypes => (None, Scalar, Identity),
            Self::SourceTransformation => (None, Scalar, Identity),
            Self::StartOffset => (Some("so"), Scalar, Range),
            Self::StreamingProfile => (Some("sp"), Scalar, Identity),
            Self::Transformation => (Some("t"), Nested { sep: "." }, Identity),
            Self::Underlay => (Some("u"), ParamSpec::Layer, Identity),
            Self::Variables => (None, Array { sep: ":" }, Identity),
            Self::VideoCodec => (Some("vc"), Scalar, Process::VideoCodec),
            Self::VideoSampling => (Some("vs"), Scalar, Identity),
            Self::Width => (Some("w"), Scalar, Dimension),
            Self::X => (Some("x"), Scalar, Expression),
            Self::Y => (Some("y"), Scalar, Expression),
            Self::Zoom => (Some("z"), Scalar, Expression),
            Self::Else | Self::EndIf | Self::If | Self::Offset | Self::Size => return None,
        };
        Some(Param::new(self.name(), code, spec, process))
    }
}

macro_rules! builder_setters {
    ($($method:ident => $variant:ident),* $(,)?) => {
        impl Transformation {
            $(
                pub fn $method(mut self, value: impl Into<Value>) -> Self {
                    self.apply(ParamName::$variant, value.into());
                    self
                }
            )*
        }
    };
}

builder_setters! {
    angle => Angle,
    audio_codec => AudioCodec,
    audio_frequency => AudioFrequency,
    aspect_ratio => AspectRatio,
    background => Background,
    bit_rate => BitRate,
    border => Border,
    color => Color,
    color_space => ColorSpace,
    crop => Crop,
    default_image => DefaultImage,
    delay => Delay,
    density => Density,
    duration => Duration,
    dpr => Dpr,
    effect => Effect,
    end_offset => EndOffset,
    fallback_content => FallbackContent,
    fetch_format => FetchFormat,
    format => Format,
    flags => Flags,
    gravity => Gravity,
    fps => Fps,
    height => Height,
    html_height => HtmlHeight,
    html_width => HtmlWidth,
    keyframe_interval => KeyframeInterval,
    offset => Offset,
    opacity => Opacity,
    overlay => Overlay,
    page => Page,
    poster => Poster,
    prefix => Prefix,
    quality => Quality,
    radius => Radius,
    raw_transformation => RawTransformation,
    size => Size,
    source_types => SourceTypes,
    source_transformation => SourceTransformation,
    start_offset => StartOffset,
    streaming_profile => StreamingProfile,
    transformation => Transformation,
    underlay => Underlay,
    variables => Variables,
    video_codec => VideoCodec,
    video_sampling => VideoSampling,
    width => Width,
    x => X,
    y => Y,
    zoom => Zoom,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::camel_case;

    #[test]
    fn test_lookup_accepts_both_casings() {
        assert_eq!(ParamName::lookup(&camel_case("audio_codec")), Some(ParamName::AudioCodec));
        assert_eq!(ParamName::lookup(&camel_case("audioCodec")), Some(ParamName::AudioCodec));
        assert_eq!(ParamName::lookup(&camel_case("end_if")), Some(ParamName::EndIf));
        assert_eq!(ParamName::lookup("alt"), None);
    }

    #[test]
    fn test_names_round_trip_through_casing() {
        for name in ParamName::ALL {
            assert_eq!(camel_case(name.name()), name.camel_name(), "{:?}", name);
            assert_eq!(ParamName::lookup(name.camel_name()), Some(*name));
        }
    }

    #[test]
    fn test_param_definitions() {
        let width = ParamName::Width.param().expect("width installs a param");
        assert_eq!(width.name(), "width");
        assert_eq!(width.short_name(), Some("w"));
        assert_eq!(width.process(), Process::Dimension);

        let effect = ParamName::Effect.param().expect("effect installs a param");
        assert_eq!(effect.spec(), ParamSpec::Array { sep: ":" });

        assert!(ParamName::If.param().is_none());
        assert!(ParamName::Size.param().is_none());
        assert!(ParamName::Format.param().and_then(|p| p.short_name().map(str::to_string)).is_none());
    }
}
