//! Conditional and computed expressions
//!
//! Expressions travel on the wire in an operator-coded form: `width > 100`
//! becomes `w_gt_100`. [`normalize`] performs that rewrite on free text and
//! [`Expression`] / [`Condition`] build the same form incrementally.

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::transformation::Transformation;
use crate::util::value_token;

/// Textual operators and their wire codes.
pub const OPERATORS: &[(&str, &str)] = &[
    ("=", "eq"),
    ("!=", "ne"),
    ("<", "lt"),
    (">", "gt"),
    ("<=", "lte"),
    (">=", "gte"),
    ("&&", "and"),
    ("||", "or"),
    ("*", "mul"),
    ("/", "div"),
    ("+", "add"),
    ("-", "sub"),
    ("^", "pow"),
];

/// Predefined variables and their wire codes, in match priority order.
pub const PREDEFINED_VARS: &[(&str, &str)] = &[
    ("aspect_ratio", "ar"),
    ("aspectRatio", "ar"),
    ("current_page", "cp"),
    ("currentPage", "cp"),
    ("face_count", "fc"),
    ("faceCount", "fc"),
    ("height", "h"),
    ("initial_aspect_ratio", "iar"),
    ("initial_height", "ih"),
    ("initial_width", "iw"),
    ("initialAspectRatio", "iar"),
    ("initialHeight", "ih"),
    ("initialWidth", "iw"),
    ("page_count", "pc"),
    ("page_x", "px"),
    ("page_y", "py"),
    ("pageCount", "pc"),
    ("pageX", "px"),
    ("pageY", "py"),
    ("tags", "tags"),
    ("width", "w"),
];

/// Look up the wire code of a textual operator.
pub fn operator_code(operator: &str) -> Option<&'static str> {
    OPERATORS.iter().find(|(op, _)| *op == operator).map(|(_, code)| *code)
}

fn predefined_code(name: &str) -> Option<&'static str> {
    PREDEFINED_VARS.iter().find(|(var, _)| *var == name).map(|(_, code)| *code)
}

// An operator only counts when a boundary follows it. The boundary is
// captured and written back unchanged.
fn operator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\|\||>=|<=|&&|!=|>|=|<|/|-|\+|\*|\^)([ _])").expect("operator pattern is valid")
    })
}

fn predefined_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let names: Vec<&str> = PREDEFINED_VARS.iter().map(|(name, _)| *name).collect();
        Regex::new(&format!("({})", names.join("|"))).expect("predefined variable pattern is valid")
    })
}

fn boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ _]+").expect("boundary pattern is valid"))
}

fn is_quoted_literal(text: &str) -> bool {
    text.len() > 2 && text.starts_with('!') && text.ends_with('!')
}

/// Normalize an expression: operator and variable codes, boundaries collapsed to `_`.
///
/// `!…!` quoted literals are returned untouched.
pub fn normalize(expression: &str) -> String {
    if is_quoted_literal(expression) {
        return expression.to_string();
    }

    let with_operators = operator_re().replace_all(expression, |caps: &Captures| {
        let op = &caps[1];
        format!("{}{}", operator_code(op).unwrap_or(op), &caps[2])
    });

    let mut with_vars = String::with_capacity(with_operators.len());
    let mut last = 0;
    for m in predefined_re().find_iter(&with_operators) {
        with_vars.push_str(&with_operators[last..m.start()]);
        if with_operators[..m.start()].ends_with('$') {
            with_vars.push_str(m.as_str());
        } else {
            with_vars.push_str(predefined_code(m.as_str()).unwrap_or(m.as_str()));
        }
        last = m.end();
    }
    with_vars.push_str(&with_operators[last..]);

    boundary_re().replace_all(&with_vars, "_").into_owned()
}

/// Normalize a loose value. Null passes through; other values are rendered first.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(normalize(s)),
        other => Value::String(normalize(&value_token(other))),
    }
}

/// An expression assembled from raw text and predicate calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    expressions: Vec<String>,
}

impl Expression {
    pub fn new() -> Self {
        Self { expressions: Vec::new() }
    }

    /// Start from free text; the text is normalized immediately.
    pub fn parse(text: &str) -> Self {
        Self { expressions: vec![normalize(text)] }
    }

    /// Append `name_operator_value`, translating a textual operator to its code.
    pub fn predicate(mut self, name: &str, operator: &str, value: impl Into<Value>) -> Self {
        let operator = operator_code(operator).unwrap_or(operator);
        self.expressions.push(format!("{}_{}_{}", name, operator, value_token(&value.into())));
        self
    }

    pub fn and(mut self) -> Self {
        self.expressions.push("and".to_string());
        self
    }

    pub fn or(mut self) -> Self {
        self.expressions.push("or".to_string());
        self
    }

    /// Append a raw token.
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.expressions.push(value_token(&value.into()));
        self
    }

    /// `name` followed by `value`, as used for variable assignment.
    pub fn variable(name: &str, value: impl Into<Value>) -> Self {
        Self::parse(name).value(value)
    }

    pub fn width() -> Self {
        Self::parse("width")
    }

    pub fn height() -> Self {
        Self::parse("height")
    }

    pub fn initial_width() -> Self {
        Self::parse("initialWidth")
    }

    pub fn initial_height() -> Self {
        Self::parse("initialHeight")
    }

    pub fn aspect_ratio() -> Self {
        Self::parse("aspectRatio")
    }

    pub fn initial_aspect_ratio() -> Self {
        Self::parse("initialAspectRatio")
    }

    pub fn page_count() -> Self {
        Self::parse("pageCount")
    }

    pub fn face_count() -> Self {
        Self::parse("faceCount")
    }

    pub fn current_page() -> Self {
        Self::parse("currentPage")
    }

    pub fn tags() -> Self {
        Self::parse("tags")
    }

    pub fn page_x() -> Self {
        Self::parse("pageX")
    }

    pub fn page_y() -> Self {
        Self::parse("pageY")
    }

    /// Join the accumulated tokens with `_` and normalize the result.
    pub fn serialize(&self) -> String {
        normalize(&self.expressions.join("_"))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// A condition under construction, optionally bound to the transformation
/// that [`Condition::then`] hands it back to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    expression: Expression,
    parent: Option<Transformation>,
}

impl Condition {
    pub fn new() -> Self {
        Self { expression: Expression::new(), parent: None }
    }

    pub fn parse(text: &str) -> Self {
        Self { expression: Expression::parse(text), parent: None }
    }

    pub(crate) fn bound(parent: Transformation) -> Self {
        Self { expression: Expression::new(), parent: Some(parent) }
    }

    pub fn predicate(mut self, name: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.expression = self.expression.predicate(name, operator, value);
        self
    }

    pub fn width(self, operator: &str, value: impl Into<Value>) -> Self {
        self.predicate("w", operator, value)
    }

    pub fn height(self, operator: &str, value: impl Into<Value>) -> Self {
        self.predicate("h", operator, value)
    }

    pub fn aspect_ratio(self, operator: &str, value: impl Into<Value>) -> Self {
        self.predicate("ar", operator, value)
    }

    pub fn page_count(self, operator: &str, value: impl Into<Value>) -> Self {
        self.predicate("pc", operator, value)
    }

    pub fn face_count(self, operator: &str, value: impl Into<Value>) -> Self {
        self.predicate("fc", operator, value)
    }

    pub fn and(mut self) -> Self {
        self.expression = self.expression.and();
        self
    }

    pub fn or(mut self) -> Self {
        self.expression = self.expression.or();
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.expression = self.expression.value(value);
        self
    }

    pub fn serialize(&self) -> String {
        self.expression.serialize()
    }

    /// Close the condition and continue building the bound transformation.
    pub fn then(self) -> Transformation {
        let condition = self.serialize();
        self.parent.unwrap_or_default().if_(condition)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_operators() {
        assert_eq!(normalize("width > 100"), "w_gt_100");
        assert_eq!(normalize("w_>=_100"), "w_gte_100");
        assert_eq!(normalize("a != b && c || d"), "a_ne_b_and_c_or_d");
        assert_eq!(normalize("x * 2 + 1 - 3 / 4 ^ 2"), "x_mul_2_add_1_sub_3_div_4_pow_2");
    }

    #[test]
    fn test_operator_without_boundary_is_kept() {
        assert_eq!(normalize("fill-light"), "fill-light");
        assert_eq!(normalize("a>b"), "a>b");
        assert_eq!(normalize("-5"), "-5");
    }

    #[test]
    fn test_normalize_predefined_vars() {
        assert_eq!(normalize("aspectRatio < 3:4"), "ar_lt_3:4");
        assert_eq!(normalize("faceCount > 2"), "fc_gt_2");
        assert_eq!(normalize("initial_width"), "iw");
        assert_eq!(normalize("pageX"), "px");
    }

    #[test]
    fn test_dollar_prefixed_names_are_user_variables() {
        assert_eq!(normalize("$width * 2"), "$width_mul_2");
        assert_eq!(normalize("width * $height"), "w_mul_$height");
    }

    #[test]
    fn test_boundaries_collapse() {
        assert_eq!(normalize("w  _ gt   100"), "w_gt_100");
    }

    #[test]
    fn test_quoted_literal_passes_through() {
        assert_eq!(normalize("!width > 100!"), "!width > 100!");
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value(&json!(null)), json!(null));
        assert_eq!(normalize_value(&json!(1.5)), json!("1.5"));
        assert_eq!(normalize_value(&json!("height")), json!("h"));
    }

    #[test]
    fn test_normalize_is_idempotent_on_samples() {
        for sample in ["width > 100 && height < 200", "$foo_mul_2", "w_gt_100", "x + y"] {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "sample {:?}", sample);
        }
    }

    #[test]
    fn test_expression_builder() {
        let expr = Expression::new().predicate("w", ">", 100).and().predicate("h", "lt", 50);
        assert_eq!(expr.serialize(), "w_gt_100_and_h_lt_50");
        assert_eq!(Expression::width().value("* 2").serialize(), "w_mul_2");
        assert_eq!(Expression::variable("$small", 150).to_string(), "$small_150");
        assert_eq!(Expression::initial_aspect_ratio().serialize(), "iar");
    }

    #[test]
    fn test_condition_then_sets_if() {
        let tr = Transformation::new()
            .if_builder()
            .width(">", 1000)
            .and()
            .aspect_ratio("<", "3:4")
            .then()
            .crop("scale")
            .width(1000);
        assert_eq!(tr.serialize().expect("should serialize"), "if_w_gt_1000_and_ar_lt_3:4,c_scale,w_1000");
    }

    #[test]
    fn test_unbound_condition_then_starts_new_transformation() {
        let tr = Condition::new().face_count(">", 2).then().effect("blur");
        assert_eq!(tr.serialize().expect("should serialize"), "if_fc_gt_2,e_blur");
    }
}
