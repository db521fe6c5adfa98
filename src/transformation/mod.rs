//! Transformation chains
//!
//! A [`Transformation`] holds the parameters of the link being built, the
//! frozen links created by [`Transformation::chain`], and any option that is
//! not a transformation parameter (HTML attributes, delivery settings).
//!
//! ```
//! use cldurl::Transformation;
//!
//! let tr = Transformation::new().width(10).crop("fit").chain().angle(15);
//! assert_eq!(tr.serialize().unwrap(), "c_fit,w_10/a_15");
//! ```

mod grouping;
mod setters;

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, trace};

pub use grouping::split_points;
pub use setters::ParamName;

use crate::config::CONFIG_PARAMS;
use crate::expression::{normalize, Condition};
use crate::layer::LayerError;
use crate::param::{Param, Process, Serialized};
use crate::util::{camel_case, parse_float_prefix, snake_case, truthy, value_token, Options};

/// Separator between chain links.
pub const TRANS_SEPARATOR: &str = "/";
/// Separator between parameters of one link.
pub const PARAM_SEPARATOR: &str = ",";

/// Returns true for user variable names such as `$width2`.
pub fn is_variable_name(name: &str) -> bool {
    match name.strip_prefix('$') {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric()),
        None => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformation {
    params: BTreeMap<String, Param>,
    chained: Vec<Transformation>,
    other_options: Options,
}

impl Transformation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an options value.
    ///
    /// A string or array is taken as the `transformation` parameter. In a
    /// hash, `if` is applied before any other key, `$name` keys become user
    /// variables and unrecognized keys land in the other options.
    pub fn from_options(options: &Value) -> Self {
        let mut tr = Self::new();
        tr.merge_options(options);
        tr
    }

    /// Build from an options hash.
    pub fn from_map(options: &Options) -> Self {
        let mut tr = Self::new();
        tr.merge_map(options);
        tr
    }

    /// Copy every parameter of `other` (not its chained links).
    pub fn from_transformation(other: &Transformation) -> Self {
        let mut tr = Self::new();
        for param in other.params.values() {
            if is_variable_name(param.name()) {
                tr.set_variable(param.name(), param.orig_value().clone());
            } else {
                tr.set_mut(param.name(), param.orig_value().clone());
            }
        }
        tr
    }

    pub fn merge_options(&mut self, options: &Value) {
        match options {
            Value::String(_) | Value::Array(_) => self.apply(ParamName::Transformation, options.clone()),
            Value::Object(map) => self.merge_map(map),
            _ => {}
        }
    }

    fn merge_map(&mut self, options: &Options) {
        if let Some(condition) = options.get("if").filter(|v| truthy(v)) {
            self.apply(ParamName::If, condition.clone());
        }
        for (key, value) in options {
            if key == "if" {
                continue;
            }
            if is_variable_name(key) {
                if key != "$attr" {
                    self.set_variable(key, value.clone());
                }
            } else {
                self.set_mut(key, value.clone());
            }
        }
    }

    /// Set a parameter by snake_case or camelCase name. Unknown names are
    /// kept as other options.
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_mut(key, value.into());
        self
    }

    pub fn set_mut(&mut self, key: &str, value: Value) {
        match ParamName::lookup(&camel_case(key)) {
            Some(name) => self.apply(name, value),
            None => {
                self.other_options.insert(key.to_string(), value);
            }
        }
    }

    pub(crate) fn apply(&mut self, name: ParamName, value: Value) {
        match name {
            ParamName::If => self.set_if(value),
            ParamName::Else => self.set_if(Value::from("else")),
            ParamName::EndIf => self.set_if(Value::from("end")),
            ParamName::Offset => {
                let (start, end) = split_offset(&value);
                if let Some(start) = start {
                    self.apply(ParamName::StartOffset, start);
                }
                if let Some(end) = end {
                    self.apply(ParamName::EndOffset, end);
                }
            }
            ParamName::Size => {
                if let Value::String(size) = &value {
                    let mut parts = size.split('x');
                    if let Some(width) = parts.next() {
                        self.apply(ParamName::Width, Value::from(width));
                    }
                    if let Some(height) = parts.next() {
                        self.apply(ParamName::Height, Value::from(height));
                    }
                }
            }
            other => {
                if let Some(param) = other.param() {
                    self.params.insert(other.name().to_string(), param.set(value));
                }
            }
        }
    }

    fn set_if(&mut self, value: Value) {
        match value.as_str() {
            Some("else") => {
                self.chain_mut();
                self.params.insert("if".to_string(), Param::scalar("if", Some("if"), Process::Identity).set(value));
            }
            Some("end") => {
                self.chain_mut();
                self.params.insert("if".to_string(), Param::scalar("if", Some("if"), Process::Identity).set(value));
            }
            Some("") => {}
            _ if value.is_null() => {}
            _ => {
                self.params.insert("if".to_string(), Param::scalar("if", Some("if"), Process::Condition).set(value));
            }
        }
    }

    /// Start a conditional branch (`"else"` and `"end"` close one).
    pub fn if_(mut self, condition: impl Into<Value>) -> Self {
        self.set_if(condition.into());
        self
    }

    /// Start a conditional built with [`Condition`] predicates.
    pub fn if_builder(self) -> Condition {
        Condition::bound(self)
    }

    pub fn else_(self) -> Self {
        self.if_("else")
    }

    pub fn end_if(self) -> Self {
        self.if_("end")
    }

    /// Assign a user variable (`$name`).
    pub fn variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set_variable(name, value.into());
        self
    }

    fn set_variable(&mut self, name: &str, value: Value) {
        self.params.insert(name.to_string(), Param::scalar(name, Some(name), Process::Identity).set(value));
    }

    /// Freeze the current parameters into a chained link and start a new one.
    pub fn chain(mut self) -> Self {
        self.chain_mut();
        self
    }

    pub fn chain_mut(&mut self) {
        if self.params.is_empty() {
            return;
        }
        let snapshot = Transformation {
            params: std::mem::take(&mut self.params),
            chained: Vec::new(),
            other_options: self.other_options.clone(),
        };
        self.chained.push(snapshot);
    }

    /// Sorted names of the parameters in the current link.
    pub fn keys(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }

    pub fn chained(&self) -> &[Transformation] {
        &self.chained
    }

    pub fn other_options(&self) -> &Options {
        &self.other_options
    }

    /// The processed value of a parameter, falling back to the other options.
    pub fn value(&self, name: &str) -> Result<Value, LayerError> {
        let processed = match self.params.get(name) {
            Some(param) => self.param_value(param)?,
            None => Value::Null,
        };
        if processed.is_null() {
            Ok(self.other_options.get(name).cloned().unwrap_or(Value::Null))
        } else {
            Ok(processed)
        }
    }

    /// Remove a parameter (or other option) and return its original value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        if let Some(param) = self.params.remove(name) {
            return Some(param.orig_value().clone());
        }
        self.other_options.remove(name).filter(|v| !v.is_null())
    }

    fn orig_truthy(&self, name: &str) -> bool {
        match self.params.get(name) {
            Some(param) => truthy(param.orig_value()),
            None => self.other_options.get(name).map_or(false, truthy),
        }
    }

    pub fn has_layer(&self) -> bool {
        self.orig_truthy("overlay") || self.orig_truthy("underlay")
    }

    // Width and height only resize next to a crop mode or a layer.
    fn has_operation(&self) -> bool {
        self.orig_truthy("crop") || self.has_layer()
    }

    fn param_value(&self, param: &Param) -> Result<Value, LayerError> {
        if param.process() == Process::Dimension && !self.has_operation() {
            return Ok(Value::Null);
        }
        param.value()
    }

    fn serialize_param(&self, param: &Param) -> Result<Serialized, LayerError> {
        let value = self.param_value(param)?;
        param.serialize_value(&value)
    }

    fn condition(&self) -> Result<Option<String>, LayerError> {
        match self.params.get("if") {
            Some(param) => {
                let value = param.value()?;
                Ok((!value.is_null()).then(|| value_token(&value)))
            }
            None => Ok(None),
        }
    }

    fn without_if(&self) -> Transformation {
        let mut link = self.clone();
        link.params.remove("if");
        link
    }

    /// Serialize the current link only: nested links first, then the link itself.
    fn serialize_link(&self) -> Result<Vec<String>, LayerError> {
        let mut vars = Vec::new();
        let mut list = Vec::new();
        let mut nested = Vec::new();

        for (name, param) in &self.params {
            match name.as_str() {
                "transformation" => match self.serialize_param(param)? {
                    Serialized::Token(token) => list.push(token),
                    Serialized::Links(links) => nested = links,
                },
                "if" | "variables" => {}
                _ if is_variable_name(name) => {
                    let value = self.param_value(param)?;
                    vars.push(format!("{}_{}", name, normalize(&value_token(&value))));
                }
                _ => {
                    if let Serialized::Token(token) = self.serialize_param(param)? {
                        list.push(token);
                    }
                }
            }
        }

        list.retain(|token| !token.is_empty());
        vars.sort();
        list.sort();

        let mut components = vars;
        if let Some(variables) = self.params.get("variables") {
            components.extend(declared_variables(&variables.value()?));
        }
        components.extend(list);

        if let Some(param) = self.params.get("if") {
            if let Serialized::Token(if_token) = param.serialize()? {
                if if_token == "if_end" {
                    components.push(if_token);
                } else if !if_token.is_empty() {
                    components.insert(0, if_token);
                }
            }
        }

        let link = components.into_iter().filter(|c| !c.is_empty()).collect::<Vec<_>>().join(PARAM_SEPARATOR);
        trace!(link = %link, nested = nested.len(), "serialized link");

        let mut out = nested;
        if !link.is_empty() {
            out.push(link);
        }
        Ok(out)
    }

    fn links(&self) -> Vec<&Transformation> {
        self.chained.iter().chain(std::iter::once(self)).collect()
    }

    /// Serialize every chained link and the current one, joined by `/`.
    pub fn serialize(&self) -> Result<String, LayerError> {
        let links = self.links();
        let conditions = links.iter().map(|link| link.condition()).collect::<Result<Vec<_>, _>>()?;
        let splits = split_points(&conditions);

        let mut result = Vec::new();
        for (link, split) in links.iter().zip(&splits) {
            if *split {
                if let Some(Serialized::Token(if_token)) = link.params.get("if").map(Param::serialize).transpose()? {
                    debug!(condition = %if_token, "collapsing conditional group");
                    result.push(if_token);
                }
                result.extend(link.without_if().serialize_link()?);
            } else {
                result.extend(link.serialize_link()?);
            }
        }

        result.retain(|segment| !segment.is_empty());
        Ok(result.join(TRANS_SEPARATOR))
    }

    fn link_options(&self) -> Options {
        let mut opt = Options::new();
        for (name, param) in &self.params {
            opt.insert(name.clone(), param.orig_value().clone());
        }
        for (key, value) in &self.other_options {
            if !value.is_null() {
                opt.insert(key.clone(), value.clone());
            }
        }
        opt
    }

    /// An options hash that rebuilds this transformation.
    ///
    /// Chained links (when `with_chain` is set) move under `transformation`;
    /// collapsed conditional links are written as nested pairs.
    pub fn to_options(&self, with_chain: bool) -> Options {
        let opt = self.link_options();
        if !with_chain || self.chained.is_empty() {
            return opt;
        }

        let links = self.links();
        let conditions: Vec<Option<String>> =
            links.iter().map(|link| link.params.get("if").map(|p| value_token(p.orig_value()))).collect();
        let splits = split_points(&conditions);

        let mut list: Vec<Value> = Vec::new();
        for (link, split) in self.chained.iter().zip(&splits) {
            let link_opts = if *split {
                let condition = link.params.get("if").map(|p| p.orig_value().clone()).unwrap_or(Value::Null);
                json!({ "transformation": [{ "if": condition }, Value::Object(link.without_if().link_options())] })
            } else {
                Value::Object(link.link_options())
            };
            list.push(link_opts);
        }
        list.push(Value::Object(opt));

        let mut result: Options =
            self.other_options.iter().filter(|(_, v)| !v.is_null()).map(|(k, v)| (k.clone(), v.clone())).collect();
        result.insert("transformation".to_string(), Value::Array(list));
        result
    }

    /// Processed parameter values, with chained links under `transformation`.
    pub fn to_plain_object(&self) -> Result<Value, LayerError> {
        let mut hash = Options::new();
        for (name, param) in &self.params {
            hash.insert(name.clone(), self.param_value(param)?);
        }
        if self.chained.is_empty() {
            return Ok(Value::Object(hash));
        }
        let mut list = self.chained.iter().map(Transformation::to_plain_object).collect::<Result<Vec<_>, _>>()?;
        list.push(Value::Object(hash));
        Ok(json!({ "transformation": list }))
    }

    /// Attributes for an HTML tag rendering this transformation.
    ///
    /// Other options that are not parameter or configuration names pass
    /// through with any `html_` prefix removed. `width` and `height` are added
    /// when the link does not resize by fit, limit or lfill, rotate, or layer.
    pub fn to_html_attributes(&self) -> Result<Options, LayerError> {
        let mut options = Options::new();
        for (key, value) in &self.other_options {
            if param_names().contains(&snake_case(key).as_str()) {
                continue;
            }
            let attr = key.strip_prefix("html_").unwrap_or(key);
            options.insert(attr.to_string(), value.clone());
        }

        for key in self.keys() {
            if let Some(attr) = key.strip_prefix("html_") {
                options.insert(camel_case(attr), self.value(&key)?);
            }
        }

        let crop = self.value("crop")?;
        let resizes = matches!(crop.as_str(), Some("fit" | "limit" | "lfill"));
        if !(self.has_layer() || truthy(&self.value("angle")?) || resizes) {
            for dimension in ["width", "height"] {
                if let Some(param) = self.params.get(dimension) {
                    let orig = param.orig_value();
                    let large_enough = parse_float_prefix(&value_token(orig)).map_or(false, |v| v >= 1.0);
                    if large_enough && !options.contains_key(dimension) {
                        options.insert(dimension.to_string(), orig.clone());
                    }
                }
            }
        }
        Ok(options)
    }

    /// Returns true if `name` (snake_case or camelCase) is a transformation setter.
    pub fn is_valid_param_name(name: &str) -> bool {
        let camel = camel_case(name);
        camel == "variable" || ParamName::lookup(&camel).is_some()
    }
}

impl std::fmt::Display for Transformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.serialize() {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(std::fmt::Error),
        }
    }
}

impl From<Transformation> for Value {
    fn from(tr: Transformation) -> Self {
        Value::Object(tr.to_options(true))
    }
}

/// Setter names plus configuration names, in snake_case.
pub fn param_names() -> Vec<&'static str> {
    ParamName::ALL.iter().map(|name| name.name()).chain(["variable"]).chain(CONFIG_PARAMS.iter().copied()).collect()
}

fn split_offset(value: &Value) -> (Option<Value>, Option<Value>) {
    match value {
        Value::String(range) => {
            let mut parts = range.split("..");
            (parts.next().map(Value::from), parts.next().map(Value::from))
        }
        Value::Array(items) => {
            (items.first().filter(|v| !v.is_null()).cloned(), items.get(1).filter(|v| !v.is_null()).cloned())
        }
        _ => (None, None),
    }
}

fn declared_variables(value: &Value) -> Vec<String> {
    match value {
        Value::Array(pairs) => pairs
            .iter()
            .filter_map(|pair| match pair {
                Value::Array(entry) => {
                    let name = entry.first().map(value_token).unwrap_or_default();
                    let value = entry.get(1).map(value_token).unwrap_or_default();
                    Some(format!("{}_{}", name, normalize(&value)))
                }
                Value::Null => None,
                other => Some(value_token(other)),
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![value_token(other)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_alone_is_suppressed() {
        assert_eq!(Transformation::new().width(100).serialize(), Ok(String::new()));
    }

    #[test]
    fn test_params_are_sorted() {
        let tr = Transformation::new().crop("fill").width(100).height(200);
        assert_eq!(tr.serialize(), Ok("c_fill,h_200,w_100".to_string()));
    }

    #[test]
    fn test_chain() {
        let tr = Transformation::new().width(10).crop("fit").chain().angle(15);
        assert_eq!(tr.serialize(), Ok("c_fit,w_10/a_15".to_string()));
    }

    #[test]
    fn test_chain_of_empty_link_is_noop() {
        let tr = Transformation::new().chain().chain().crop("fill");
        assert!(tr.chained().is_empty());
        assert_eq!(tr.serialize(), Ok("c_fill".to_string()));
    }

    #[test]
    fn test_setting_twice_overwrites() {
        let tr = Transformation::new().crop("fill").crop("scale");
        assert_eq!(tr.serialize(), Ok("c_scale".to_string()));
    }

    #[test]
    fn test_from_options_snake_and_camel() {
        let tr = Transformation::from_options(&json!({"audio_codec": "aac", "bitRate": "1m", "alt": "x"}));
        assert_eq!(tr.serialize(), Ok("ac_aac,br_1m".to_string()));
        assert_eq!(tr.other_options().get("alt"), Some(&json!("x")));
    }

    #[test]
    fn test_from_string_is_named_transformation() {
        assert_eq!(Transformation::from_options(&json!("blip")).serialize(), Ok("t_blip".to_string()));
        assert_eq!(Transformation::from_options(&json!(["a", "b"])).serialize(), Ok("t_a.b".to_string()));
    }

    #[test]
    fn test_nested_transformations_precede_link() {
        let tr = Transformation::from_options(&json!({
            "transformation": [{"crop": "fit", "width": 100}, {"angle": 90}],
            "effect": "sepia"
        }));
        assert_eq!(tr.serialize(), Ok("c_fit,w_100/a_90/e_sepia".to_string()));
    }

    #[test]
    fn test_named_transformation_sorted_with_params() {
        let tr = Transformation::from_options(&json!({"transformation": "blip", "crop": "fill", "width": 10}));
        assert_eq!(tr.serialize(), Ok("c_fill,t_blip,w_10".to_string()));
    }

    #[test]
    fn test_user_variables_first() {
        let tr = Transformation::from_options(&json!({
            "$zvar": "width * 2",
            "$avar": 10,
            "$attr": "ignored",
            "crop": "scale",
            "width": "$zvar"
        }));
        assert_eq!(tr.serialize(), Ok("$avar_10,$zvar_w_mul_2,c_scale,w_$zvar".to_string()));
    }

    #[test]
    fn test_declared_variables_keep_order() {
        let tr = Transformation::new().variables(json!([["$z", 1], ["$a", "height / 2"]])).crop("fill");
        assert_eq!(tr.serialize(), Ok("$z_1,$a_h_div_2,c_fill".to_string()));
    }

    #[test]
    fn test_if_condition_goes_first() {
        let tr = Transformation::new().if_("w_lt_200").crop("fill").height(120).width(80);
        assert_eq!(tr.serialize(), Ok("if_w_lt_200,c_fill,h_120,w_80".to_string()));
    }

    #[test]
    fn test_if_else_end_grouping() {
        let tr = Transformation::new()
            .if_("w_lt_200")
            .crop("fill")
            .height(120)
            .width(80)
            .else_()
            .crop("scale")
            .width(120)
            .end_if()
            .effect("sepia");
        assert_eq!(
            tr.serialize(),
            Ok("if_w_lt_200/c_fill,h_120,w_80/if_else/c_scale,w_120/e_sepia,if_end".to_string())
        );
    }

    #[test]
    fn test_if_end_without_else() {
        let tr = Transformation::new().if_("aspect_ratio > 0.8").width(100).crop("scale").end_if();
        assert_eq!(tr.serialize(), Ok("if_ar_gt_0.8/c_scale,w_100/if_end".to_string()));
    }

    #[test]
    fn test_if_from_options_applied_first() {
        let tr = Transformation::from_options(&json!({"crop": "fill", "if": "face_count > 2", "width": 50}));
        assert_eq!(tr.serialize(), Ok("if_fc_gt_2,c_fill,w_50".to_string()));
    }

    #[test]
    fn test_empty_if_is_noop() {
        let tr = Transformation::new().if_("").crop("fill");
        assert_eq!(tr.serialize(), Ok("c_fill".to_string()));
    }

    #[test]
    fn test_offset_and_size_split() {
        let tr = Transformation::new().offset("2.5..35%").size("100x200").crop("fill");
        assert_eq!(tr.serialize(), Ok("c_fill,eo_35p,h_200,so_2.5,w_100".to_string()));
        let tr = Transformation::new().offset(json!([1, null]));
        assert_eq!(tr.serialize(), Ok("so_1".to_string()));
    }

    #[test]
    fn test_overlay_enables_width() {
        let tr = Transformation::new().overlay("text:hello").width(100);
        assert_eq!(tr.serialize(), Ok("l_text:hello,w_100".to_string()));
    }

    #[test]
    fn test_raw_transformation_sorted_verbatim() {
        let tr = Transformation::new().raw_transformation("g_north").crop("fill");
        assert_eq!(tr.serialize(), Ok("c_fill,g_north".to_string()));
    }

    #[test]
    fn test_layer_error_propagates() {
        let tr = Transformation::new().overlay(json!({"resource_type": "image"}));
        assert_eq!(tr.serialize(), Err(LayerError::MissingPublicId));
    }

    #[test]
    fn test_value_and_remove() {
        let mut tr = Transformation::new().background("#000").set("alt", "pic");
        assert_eq!(tr.value("background"), Ok(json!("rgb:000")));
        assert_eq!(tr.value("alt"), Ok(json!("pic")));
        assert_eq!(tr.remove("background"), Some(json!("#000")));
        assert_eq!(tr.remove("alt"), Some(json!("pic")));
        assert_eq!(tr.remove("missing"), None);
        assert!(tr.keys().is_empty());
    }

    #[test]
    fn test_to_options_round_trip() {
        let tr = Transformation::new()
            .if_("w_lt_200")
            .crop("fill")
            .width(80)
            .else_()
            .crop("scale")
            .width(120)
            .end_if()
            .effect("sepia");
        let rebuilt = Transformation::from_map(&tr.to_options(true));
        assert_eq!(rebuilt.serialize(), tr.serialize());
    }

    #[test]
    fn test_from_transformation_copies_params() {
        let original = Transformation::new().crop("fill").width(10).set("alt", "x");
        let copy = Transformation::from_transformation(&original);
        assert_eq!(copy.serialize(), Ok("c_fill,w_10".to_string()));
        assert!(copy.other_options().is_empty());
    }

    #[test]
    fn test_to_plain_object() {
        let tr = Transformation::new().width(10).crop("fit").chain().angle(15);
        assert_eq!(
            tr.to_plain_object(),
            Ok(json!({"transformation": [{"crop": "fit", "width": "10"}, {"angle": ["15"]}]}))
        );
    }

    #[test]
    fn test_to_html_attributes() {
        let tr = Transformation::from_options(&json!({
            "width": 100,
            "height": 0.5,
            "html_height": 20,
            "alt": "pic",
            "cloud_name": "demo",
            "crop": "scale"
        }));
        let attrs = tr.to_html_attributes().expect("should build attributes");
        assert_eq!(attrs.get("alt"), Some(&json!("pic")));
        assert_eq!(attrs.get("height"), Some(&json!(20)));
        assert_eq!(attrs.get("width"), Some(&json!(100)));
        assert!(!attrs.contains_key("cloud_name"));
    }

    #[test]
    fn test_to_html_attributes_skips_dimensions_when_fitting() {
        let tr = Transformation::new().width(100).height(100).crop("fit");
        let attrs = tr.to_html_attributes().expect("should build attributes");
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_is_valid_param_name() {
        assert!(Transformation::is_valid_param_name("fetch_format"));
        assert!(Transformation::is_valid_param_name("fetchFormat"));
        assert!(Transformation::is_valid_param_name("variable"));
        assert!(!Transformation::is_valid_param_name("cloud_name"));
    }
}
