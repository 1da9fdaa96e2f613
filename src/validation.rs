//! Validation rule resolution and example value synthesis.
//!
//! Rules for an endpoint come from two places, merged in this order:
//!
//! 1. the rules accessor of the request validator type the action receives, read
//!    through [`TypeIntrospection`](crate::introspection::TypeIntrospection);
//! 2. literal validation calls found in the action's source text:
//!    `$request->validate([...])`, `Validator::make($data, [...])` and
//!    `$this->validate($request, [...])`.
//!
//! The textual scan only sees `'field' => 'rule|rule'` pairs written literally. Rule
//! arrays held in variables or built by calls are skipped without error.

use crate::introspection::{ControllerMetadataProvider, RawRuleMap, RuleValue};
use crate::parser::{find_matching, split_top_level};
use indexmap::IndexMap;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

static INLINE_VALIDATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\$\w+|request\(\s*\))\s*->\s*validate\s*\(\s*\[")
        .expect("inline validate regex should be valid")
});

static FACTORY_CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Validator::make|\$this\s*->\s*validate)\s*\(")
        .expect("validator factory regex should be valid")
});

static RULE_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"['"]([\w.*]+)['"]\s*=>\s*['"]([^'"]+)['"]"#).expect("rule pair regex should be valid")
});

/// Placeholder for required fields whose rules imply no concrete value.
pub const REQUIRED_SENTINEL: &str = "required_value";

const FILLER: char = 'a';

/// Longest filler string produced for `min:N` and `size:N`.
pub const MAX_FILLER_LEN: usize = 1024;

/// Ordered field to rule-string mapping.
///
/// Re-inserting an existing field replaces its rule but keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationRuleSet {
    rules: IndexMap<String, String>,
}

impl ValidationRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, rule: impl Into<String>) {
        self.rules.insert(field.into(), rule.into());
    }

    /// Adds every rule of `other`, overwriting on collision.
    pub fn merge(&mut self, other: ValidationRuleSet) {
        for (field, rule) in other.rules {
            self.rules.insert(field, rule);
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.rules.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn fields(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<RawRuleMap> for ValidationRuleSet {
    /// List-valued rules are joined with `|`.
    fn from(raw: RawRuleMap) -> Self {
        let mut set = ValidationRuleSet::new();
        for (field, value) in raw {
            let rule = match value {
                RuleValue::Text(rule) => rule,
                RuleValue::List(tokens) => tokens.join("|"),
            };
            set.insert(field, rule);
        }
        set
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ValidationRuleSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut set = ValidationRuleSet::new();
        for (field, rule) in iter {
            set.insert(field, rule);
        }
        set
    }
}

/// A synthesized literal standing in for a real field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExampleValue {
    String(String),
    Integer(i64),
    Boolean(bool),
    Array(Vec<ExampleValue>),
    Null,
}

impl From<&ExampleValue> for Value {
    fn from(example: &ExampleValue) -> Self {
        match example {
            ExampleValue::String(s) => Value::String(s.clone()),
            ExampleValue::Integer(n) => Value::from(*n),
            ExampleValue::Boolean(b) => Value::Bool(*b),
            ExampleValue::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            ExampleValue::Null => Value::Null,
        }
    }
}

/// Derives example values from rule strings.
///
/// The date used for `date` rules is fixed at construction so one run produces
/// one consistent value.
#[derive(Debug, Clone)]
pub struct ExampleSynthesizer {
    today: String,
}

impl Default for ExampleSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExampleSynthesizer {
    pub fn new() -> Self {
        Self::with_date(&chrono::Local::now().format("%Y-%m-%d").to_string())
    }

    pub fn with_date(today: &str) -> Self {
        Self {
            today: today.to_string(),
        }
    }

    /// Processes the `|`-separated tokens of `rule` left to right.
    pub fn synthesize(&self, rule: &str) -> ExampleValue {
        let mut example: Option<ExampleValue> = None;
        let mut required = false;

        for token in rule.split('|').map(str::trim).filter(|t| !t.is_empty()) {
            let (name, arg) = match token.split_once(':') {
                Some((name, arg)) => (name.trim(), Some(arg.trim())),
                None => (token, None),
            };

            match name {
                n if n.starts_with("required") => required = true,
                "email" => example = Some(ExampleValue::String("example@email.com".to_string())),
                "numeric" => {
                    example.get_or_insert(ExampleValue::Integer(0));
                }
                "integer" | "int" => {
                    example.get_or_insert(ExampleValue::Integer(1));
                }
                "string" => {
                    example.get_or_insert(ExampleValue::String("string".to_string()));
                }
                "boolean" | "bool" => example = Some(ExampleValue::Boolean(true)),
                "array" => example = Some(ExampleValue::Array(Vec::new())),
                "date" | "date_format" => example = Some(ExampleValue::String(self.today.clone())),
                "url" => example = Some(ExampleValue::String("https://example.com".to_string())),
                "ip" | "ipv4" => example = Some(ExampleValue::String("192.168.1.1".to_string())),
                "json" => example = Some(ExampleValue::String(r#"{"key":"value"}"#.to_string())),
                "min" => {
                    let Some(arg) = arg else { continue };
                    example = match example {
                        Some(ExampleValue::Integer(current)) => {
                            Some(ExampleValue::Integer(parse_integer(arg).unwrap_or(current)))
                        }
                        Some(ExampleValue::String(current)) => match parse_count(arg) {
                            Some(n) => Some(filler(n)),
                            None => Some(ExampleValue::String(current)),
                        },
                        other => other,
                    };
                }
                "max" => {
                    let Some(n) = arg.and_then(parse_count) else { continue };
                    if let Some(ExampleValue::String(s)) = &mut example {
                        if s.chars().count() > n {
                            *s = s.chars().take(n).collect();
                        }
                    }
                }
                "in" => {
                    if let Some(first) = arg.and_then(|a| a.split(',').next()) {
                        let first = first.trim().trim_matches(|c: char| c == '"' || c == '\'');
                        example = Some(ExampleValue::String(first.to_string()));
                    }
                }
                "size" => {
                    if let Some(n) = arg.and_then(parse_count) {
                        example = Some(filler(n));
                    }
                }
                _ => {}
            }
        }

        match example {
            Some(value) => value,
            None if required => ExampleValue::String(REQUIRED_SENTINEL.to_string()),
            None => ExampleValue::String(String::new()),
        }
    }

    /// Builds the example request body, one key per field in rule-set order.
    pub fn body(&self, rules: &ValidationRuleSet) -> Value {
        let mut body = Map::new();
        for (field, rule) in rules.iter() {
            body.insert(field.to_string(), Value::from(&self.synthesize(rule)));
        }
        Value::Object(body)
    }
}

/// Synthesizes an example for `rule` using today's date.
pub fn synthesize_example(rule: &str) -> ExampleValue {
    ExampleSynthesizer::new().synthesize(rule)
}

fn parse_count(arg: &str) -> Option<usize> {
    arg.trim().parse::<usize>().ok()
}

/// Numeric bounds outside the `i64` range are ignored.
fn parse_integer(arg: &str) -> Option<i64> {
    arg.trim().parse::<i64>().ok()
}

fn filler(n: usize) -> ExampleValue {
    if n > MAX_FILLER_LEN {
        debug!("Filler length {} capped at {}", n, MAX_FILLER_LEN);
    }
    ExampleValue::String(std::iter::repeat(FILLER).take(n.min(MAX_FILLER_LEN)).collect())
}

/// Extracts literal rule pairs from validation calls in `source`.
pub fn scan_source(source: &str) -> ValidationRuleSet {
    let mut rules = ValidationRuleSet::new();
    if source.is_empty() {
        return rules;
    }

    for m in INLINE_VALIDATE_RE.find_iter(source) {
        let open = m.end() - 1;
        match find_matching(source, open, b'[', b']') {
            Some(close) => rules.merge(extract_pairs(&source[open + 1..close])),
            None => debug!("Unbalanced validate() array at offset {}", open),
        }
    }

    for m in FACTORY_CALL_RE.find_iter(source) {
        let open = m.end() - 1;
        let Some(close) = find_matching(source, open, b'(', b')') else {
            continue;
        };
        let args = split_top_level(&source[open + 1..close], ",");
        let Some(second) = args.get(1).map(|a| a.trim()) else {
            continue;
        };
        if second.starts_with('[') {
            if let Some(end) = find_matching(second, 0, b'[', b']') {
                rules.merge(extract_pairs(&second[1..end]));
                continue;
            }
        }
        debug!("Skipping validator call with non-literal rules: {}", second);
    }

    rules
}

/// Extracts `'field' => 'rule'` pairs from the inside of an array literal.
pub fn extract_pairs(array_text: &str) -> ValidationRuleSet {
    RULE_PAIR_RE
        .captures_iter(array_text)
        .map(|caps| {
            let field = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let rule = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            (field, rule)
        })
        .collect()
}

/// Produces the rule set of an endpoint from its validator type and source text.
pub struct ValidationRuleResolver<'a> {
    provider: &'a dyn ControllerMetadataProvider,
}

impl<'a> ValidationRuleResolver<'a> {
    pub fn new(provider: &'a dyn ControllerMetadataProvider) -> Self {
        Self { provider }
    }

    /// Merges validator-accessor rules with rules scanned from the action source.
    /// Never fails: unreadable sources contribute nothing.
    pub fn resolve(
        &self,
        controller_type: &str,
        action_method: &str,
        request_validator: Option<&str>,
    ) -> ValidationRuleSet {
        let mut rules = match request_validator {
            Some(validator) => self.rules_from_validator(validator),
            None => ValidationRuleSet::new(),
        };

        let source = self.provider.source_text(controller_type, action_method);
        if source.is_empty() {
            debug!("No source available for {}::{}", controller_type, action_method);
        }
        rules.merge(scan_source(&source));
        rules
    }

    /// Invokes the rules accessor of `validator`, retrying once on its parent type.
    fn rules_from_validator(&self, validator: &str) -> ValidationRuleSet {
        if !self.provider.has_rules_accessor(validator) {
            return ValidationRuleSet::new();
        }

        match self.provider.invoke_rules_accessor(validator) {
            Ok(raw) => return ValidationRuleSet::from(raw),
            Err(e) => debug!("{}", e),
        }

        let Some(parent) = self.provider.parent_type(validator) else {
            return ValidationRuleSet::new();
        };
        if !self.provider.has_rules_accessor(&parent) {
            return ValidationRuleSet::new();
        }
        match self.provider.invoke_rules_accessor(&parent) {
            Ok(raw) => ValidationRuleSet::from(raw),
            Err(e) => {
                debug!("{}", e);
                ValidationRuleSet::new()
            }
        }
    }
}
