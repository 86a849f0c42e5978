use std::collections::HashSet;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::field::{Condition, ConditionOperator, FieldDefinition, FieldType};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("field #{0} has an empty key")]
    EmptyKey(usize),
    #[error("field key `{0}` must start with a lowercase letter and use only a-z, 0-9 and _")]
    InvalidKey(String),
    #[error("field key `{0}` is used more than once")]
    DuplicateKey(String),
    #[error("field `{0}` needs at least one option")]
    MissingOptions(String),
    #[error("field `{field}` lists option `{value}` more than once")]
    DuplicateOption { field: String, value: String },
    #[error("field `{field}` has an invalid pattern: {message}")]
    InvalidPattern { field: String, message: String },
    #[error("field `{field}` has an invalid date bound `{value}`")]
    InvalidDate { field: String, value: String },
    #[error("field `{field}` has {rule} greater than its maximum")]
    InvalidBounds { field: String, rule: &'static str },
    #[error("field `{field}` depends on `{target}`, which is not an earlier input field")]
    InvalidCondition { field: String, target: String },
    #[error("field `{field}` has a condition value that does not fit its operator")]
    InvalidConditionValue { field: String },
}

#[derive(Debug, Clone)]
struct CompiledField {
    def: FieldDefinition,
    pattern: Option<Regex>,
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
}

/// A validator built at runtime from a list of field definitions.
///
/// Compiling checks the definitions themselves; [`FormSchema::validate`] checks
/// a set of answers against them.
#[derive(Debug, Clone)]
pub struct FormSchema {
    fields: Vec<CompiledField>,
}

impl FormSchema {
    pub fn compile(definitions: &[FieldDefinition]) -> Result<Self, SchemaError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut inputs_before: HashSet<&str> = HashSet::new();
        let mut fields = Vec::with_capacity(definitions.len());

        for (index, def) in definitions.iter().enumerate() {
            let key = def.key.as_str();
            if key.is_empty() {
                return Err(SchemaError::EmptyKey(index));
            }
            if !is_valid_key(key) {
                return Err(SchemaError::InvalidKey(def.key.clone()));
            }
            if !seen.insert(key) {
                return Err(SchemaError::DuplicateKey(def.key.clone()));
            }

            if def.field_type.has_options() {
                if def.options.is_empty() {
                    return Err(SchemaError::MissingOptions(def.key.clone()));
                }
                let mut values = HashSet::new();
                for option in &def.options {
                    if !values.insert(option.value.as_str()) {
                        return Err(SchemaError::DuplicateOption {
                            field: def.key.clone(),
                            value: option.value.clone(),
                        });
                    }
                }
            }

            let rules = &def.validation;
            check_bounds(&def.key, "min_length", rules.min_length, rules.max_length)?;
            check_bounds(&def.key, "min_items", rules.min_items, rules.max_items)?;
            if let (Some(min), Some(max)) = (rules.min, rules.max) {
                if min > max {
                    return Err(SchemaError::InvalidBounds {
                        field: def.key.clone(),
                        rule: "min",
                    });
                }
            }

            let pattern = match &rules.pattern {
                Some(raw) => Some(Regex::new(raw).map_err(|e| SchemaError::InvalidPattern {
                    field: def.key.clone(),
                    message: e.to_string(),
                })?),
                None => None,
            };

            let min_date = parse_date_bound(&def.key, rules.min_date.as_deref())?;
            let max_date = parse_date_bound(&def.key, rules.max_date.as_deref())?;
            if let (Some(min), Some(max)) = (min_date, max_date) {
                if min > max {
                    return Err(SchemaError::InvalidBounds {
                        field: def.key.clone(),
                        rule: "min_date",
                    });
                }
            }

            if let Some(condition) = &def.show_if {
                if !inputs_before.contains(condition.field.as_str()) {
                    return Err(SchemaError::InvalidCondition {
                        field: def.key.clone(),
                        target: condition.field.clone(),
                    });
                }
                check_condition_value(&def.key, condition)?;
            }

            if def.field_type.is_input() {
                inputs_before.insert(key);
            }

            fields.push(CompiledField {
                def: def.clone(),
                pattern,
                min_date,
                max_date,
            });
        }

        Ok(Self { fields })
    }

    pub fn definitions(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().map(|f| &f.def)
    }

    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        self.definitions().find(|d| d.key == key)
    }

    /// Validates `answers`, returning the normalized values of every visible input
    /// field, or every error found.
    pub fn validate(&self, answers: &Map<String, Value>) -> Result<Map<String, Value>, Vec<FieldError>> {
        let mut normalized = Map::new();
        let mut visible: HashSet<&str> = HashSet::new();
        let mut errors = Vec::new();

        for field in &self.fields {
            let def = &field.def;
            let shown = match &def.show_if {
                None => true,
                Some(condition) => {
                    visible.contains(condition.field.as_str())
                        && condition_holds(condition, normalized.get(&condition.field))
                }
            };
            if !shown {
                continue;
            }
            visible.insert(def.key.as_str());

            if !def.field_type.is_input() {
                continue;
            }

            match check_field(field, answers.get(&def.key)) {
                Ok(Some(value)) => {
                    normalized.insert(def.key.clone(), value);
                }
                Ok(None) => {}
                Err(message) => errors.push(FieldError::new(def.key.clone(), message)),
            }
        }

        if errors.is_empty() {
            Ok(normalized)
        } else {
            Err(errors)
        }
    }

    /// Builds an answer object from urlencoded form pairs. Repeated keys collect into
    /// arrays for multi-select fields; keys that are not input fields are dropped.
    pub fn answers_from_pairs(&self, pairs: &[(String, String)]) -> Map<String, Value> {
        let mut answers = Map::new();
        for (key, value) in pairs {
            let Some(def) = self.field(key) else {
                continue;
            };
            match def.field_type {
                FieldType::Heading => {}
                FieldType::MultiSelect => {
                    let entry = answers
                        .entry(key.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(items) = entry {
                        items.push(Value::String(value.clone()));
                    }
                }
                _ => {
                    answers.insert(key.clone(), Value::String(value.clone()));
                }
            }
        }
        answers
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn check_bounds(
    key: &str,
    rule: &'static str,
    min: Option<usize>,
    max: Option<usize>,
) -> Result<(), SchemaError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(SchemaError::InvalidBounds {
            field: key.to_string(),
            rule,
        }),
        _ => Ok(()),
    }
}

fn parse_date_bound(key: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, SchemaError> {
    match raw {
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .map_err(|_| SchemaError::InvalidDate {
                field: key.to_string(),
                value: raw.to_string(),
            }),
        None => Ok(None),
    }
}

fn check_condition_value(key: &str, condition: &Condition) -> Result<(), SchemaError> {
    let fits = match condition.operator {
        ConditionOperator::Equals | ConditionOperator::NotEquals => !condition.value.is_null(),
        ConditionOperator::In => condition.value.as_array().is_some_and(|a| !a.is_empty()),
        ConditionOperator::IsChecked | ConditionOperator::IsNotEmpty => true,
    };
    if fits {
        Ok(())
    } else {
        Err(SchemaError::InvalidConditionValue {
            field: key.to_string(),
        })
    }
}

fn condition_holds(condition: &Condition, source: Option<&Value>) -> bool {
    match condition.operator {
        ConditionOperator::Equals => source.is_some_and(|v| matches_value(v, &condition.value)),
        ConditionOperator::NotEquals => !source.is_some_and(|v| matches_value(v, &condition.value)),
        ConditionOperator::In => {
            let Some(source) = source else {
                return false;
            };
            condition
                .value
                .as_array()
                .is_some_and(|candidates| candidates.iter().any(|c| matches_value(source, c)))
        }
        ConditionOperator::IsChecked => matches!(source, Some(Value::Bool(true))),
        ConditionOperator::IsNotEmpty => source.is_some(),
    }
}

/// Multi-select sources match when any selected value matches.
fn matches_value(source: &Value, expected: &Value) -> bool {
    match source {
        Value::Array(items) => items.iter().any(|item| loosely_equal(item, expected)),
        other => loosely_equal(other, expected),
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_text(a), as_text(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn check_field(field: &CompiledField, raw: Option<&Value>) -> Result<Option<Value>, String> {
    let def = &field.def;
    let label = def.label.as_str();

    if def.field_type == FieldType::Checkbox {
        let checked = match raw {
            None | Some(Value::Null) => false,
            Some(value) => parse_checkbox(value).ok_or_else(|| format!("{label} must be checked or unchecked"))?,
        };
        if def.required && !checked {
            return Err(format!("{label} must be checked"));
        }
        return Ok(Some(Value::Bool(checked)));
    }

    if is_blank(raw) {
        return if def.required {
            Err(format!("{label} is required"))
        } else {
            Ok(None)
        };
    }
    let Some(raw) = raw else {
        return Ok(None);
    };

    let rules = &def.validation;
    match def.field_type {
        t if t.is_textual() => {
            let Value::String(text) = raw else {
                return Err(format!("{label} must be text"));
            };
            let text = text.trim();
            let length = text.chars().count();
            if let Some(min) = rules.min_length {
                if length < min {
                    return Err(format!("{label} must be at least {min} characters"));
                }
            }
            if let Some(max) = rules.max_length {
                if length > max {
                    return Err(format!("{label} must be at most {max} characters"));
                }
            }
            if t == FieldType::Email && !is_email(text) {
                return Err(format!("{label} must be a valid email address"));
            }
            if t == FieldType::Phone && !is_phone(text) {
                return Err(format!("{label} must be a valid phone number"));
            }
            if let Some(pattern) = &field.pattern {
                if !pattern.is_match(text) {
                    return Err(rules
                        .pattern_message
                        .clone()
                        .unwrap_or_else(|| format!("{label} has an invalid format")));
                }
            }
            Ok(Some(Value::String(text.to_string())))
        }
        FieldType::Number => {
            let number = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|n| n.is_finite())
            .ok_or_else(|| format!("{label} must be a number"))?;
            if let Some(min) = rules.min {
                if number < min {
                    return Err(format!("{label} must be at least {min}"));
                }
            }
            if let Some(max) = rules.max {
                if number > max {
                    return Err(format!("{label} must be at most {max}"));
                }
            }
            Ok(Some(number_value(number)))
        }
        FieldType::Date => {
            let date = raw
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
                .ok_or_else(|| format!("{label} must be a date (YYYY-MM-DD)"))?;
            if let Some(min) = field.min_date {
                if date < min {
                    return Err(format!("{label} must be on or after {min}"));
                }
            }
            if let Some(max) = field.max_date {
                if date > max {
                    return Err(format!("{label} must be on or before {max}"));
                }
            }
            Ok(Some(Value::String(date.format(DATE_FORMAT).to_string())))
        }
        FieldType::Select | FieldType::Radio => {
            let choice = raw
                .as_str()
                .map(str::trim)
                .ok_or_else(|| format!("{label} must be a single choice"))?;
            if !def.has_option(choice) {
                return Err(format!("{label} is not one of the allowed options"));
            }
            Ok(Some(Value::String(choice.to_string())))
        }
        FieldType::MultiSelect => {
            let raw_items: Vec<&Value> = match raw {
                Value::Array(items) => items.iter().collect(),
                single @ Value::String(_) => vec![single],
                _ => return Err(format!("{label} must be a list of choices")),
            };
            let mut chosen: Vec<String> = Vec::with_capacity(raw_items.len());
            for item in raw_items {
                let choice = item
                    .as_str()
                    .map(str::trim)
                    .ok_or_else(|| format!("{label} must be a list of choices"))?;
                if !def.has_option(choice) {
                    return Err(format!("{label} contains `{choice}`, which is not allowed"));
                }
                if !chosen.iter().any(|c| c == choice) {
                    chosen.push(choice.to_string());
                }
            }
            if let Some(min) = rules.min_items {
                if chosen.len() < min {
                    return Err(format!("{label} needs at least {min} selections"));
                }
            }
            if let Some(max) = rules.max_items {
                if chosen.len() > max {
                    return Err(format!("{label} allows at most {max} selections"));
                }
            }
            Ok(Some(Value::Array(chosen.into_iter().map(Value::String).collect())))
        }
        _ => Ok(None),
    }
}

fn parse_checkbox(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" | "yes" => Some(true),
            "" | "off" | "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn is_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !text.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn is_phone(text: &str) -> bool {
    let allowed = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
    let digits = text.chars().filter(char::is_ascii_digit).count();
    allowed && (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::field::ValidationRules;
    use serde_json::json;

    fn registration_fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("intro", "About your camper", FieldType::Heading),
            FieldDefinition::new("nickname", "Nickname", FieldType::Text).with_rules(ValidationRules {
                max_length: Some(12),
                ..Default::default()
            }),
            FieldDefinition::new("contact_email", "Contact email", FieldType::Email).required(),
            FieldDefinition::new("swim_level", "Swim level", FieldType::Select)
                .required()
                .with_options(&[("none", "Non-swimmer"), ("basic", "Basic"), ("strong", "Strong")]),
            FieldDefinition::new("has_allergies", "Has allergies", FieldType::Checkbox),
            FieldDefinition::new("allergy_details", "Allergy details", FieldType::Textarea)
                .required()
                .shown_if(Condition {
                    field: "has_allergies".into(),
                    operator: ConditionOperator::IsChecked,
                    value: Value::Null,
                }),
            FieldDefinition::new("epipen", "Carries an EpiPen", FieldType::Checkbox)
                .required()
                .shown_if(Condition {
                    field: "allergy_details".into(),
                    operator: ConditionOperator::IsNotEmpty,
                    value: Value::Null,
                }),
            FieldDefinition::new("age", "Age", FieldType::Number).with_rules(ValidationRules {
                min: Some(5.0),
                max: Some(17.0),
                ..Default::default()
            }),
            FieldDefinition::new("activities", "Activities", FieldType::MultiSelect)
                .with_options(&[("canoe", "Canoe"), ("archery", "Archery"), ("crafts", "Crafts")])
                .with_rules(ValidationRules {
                    max_items: Some(2),
                    ..Default::default()
                }),
        ]
    }

    fn answers(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_submission_is_normalized() {
        let schema = FormSchema::compile(&registration_fields()).unwrap();
        let out = schema
            .validate(&answers(json!({
                "nickname": "  Sam ",
                "contact_email": "parent@example.com",
                "swim_level": "basic",
                "age": "9",
                "activities": ["canoe", "canoe", "crafts"],
                "not_a_field": "dropped",
                "intro": "also dropped"
            })))
            .unwrap();

        assert_eq!(out["nickname"], json!("Sam"));
        assert_eq!(out["age"], json!(9));
        assert_eq!(out["activities"], json!(["canoe", "crafts"]));
        assert_eq!(out["has_allergies"], json!(false));
        assert!(!out.contains_key("not_a_field"));
        assert!(!out.contains_key("intro"));
        assert!(!out.contains_key("allergy_details"));
    }

    #[test]
    fn test_collects_every_error() {
        let schema = FormSchema::compile(&registration_fields()).unwrap();
        let errors = schema
            .validate(&answers(json!({
                "nickname": "a name that is far too long",
                "contact_email": "not-an-email",
                "age": 30,
                "activities": ["canoe", "archery", "crafts"]
            })))
            .unwrap_err();

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["nickname", "contact_email", "swim_level", "age", "activities"]
        );
        assert_eq!(errors[2].message, "Swim level is required");
    }

    #[test]
    fn test_conditional_fields_follow_visibility_chain() {
        let schema = FormSchema::compile(&registration_fields()).unwrap();
        let base = json!({ "contact_email": "a@b.co", "swim_level": "none" });

        // Allergy box ticked: the details become required.
        let mut with_box = answers(base.clone());
        with_box.insert("has_allergies".into(), json!("on"));
        let errors = schema.validate(&with_box).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "allergy_details");

        // Details given: the EpiPen consent appears and is required.
        with_box.insert("allergy_details".into(), json!("peanuts"));
        let errors = schema.validate(&with_box).unwrap_err();
        assert_eq!(errors[0].field, "epipen");

        // Box unticked: both dependants are hidden and stripped even if sent.
        let mut without = answers(base);
        without.insert("allergy_details".into(), json!("peanuts"));
        without.insert("epipen".into(), json!(true));
        let out = schema.validate(&without).unwrap();
        assert!(!out.contains_key("allergy_details"));
        assert!(!out.contains_key("epipen"));
    }

    #[test]
    fn test_equals_and_in_conditions() {
        let fields = vec![
            FieldDefinition::new("transport", "Transport", FieldType::Radio)
                .required()
                .with_options(&[("bus", "Bus"), ("car", "Car"), ("walk", "Walk")]),
            FieldDefinition::new("bus_stop", "Bus stop", FieldType::Text)
                .required()
                .shown_if(Condition {
                    field: "transport".into(),
                    operator: ConditionOperator::Equals,
                    value: json!("bus"),
                }),
            FieldDefinition::new("pickup_person", "Pick-up person", FieldType::Text)
                .required()
                .shown_if(Condition {
                    field: "transport".into(),
                    operator: ConditionOperator::In,
                    value: json!(["car", "walk"]),
                }),
        ];
        let schema = FormSchema::compile(&fields).unwrap();

        let errors = schema
            .validate(&answers(json!({ "transport": "bus" })))
            .unwrap_err();
        assert_eq!(errors[0].field, "bus_stop");

        let errors = schema
            .validate(&answers(json!({ "transport": "walk", "bus_stop": "Main St" })))
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "pickup_person");
    }

    #[test]
    fn test_patterns_and_dates() {
        let fields = vec![
            FieldDefinition::new("postal_code", "Postal code", FieldType::Text).with_rules(
                ValidationRules {
                    pattern: Some(r"^\d{5}$".into()),
                    pattern_message: Some("Use a 5 digit postal code".into()),
                    ..Default::default()
                },
            ),
            FieldDefinition::new("last_tetanus", "Last tetanus shot", FieldType::Date).with_rules(
                ValidationRules {
                    min_date: Some("2015-01-01".into()),
                    ..Default::default()
                },
            ),
            FieldDefinition::new("doctor_phone", "Doctor phone", FieldType::Phone),
        ];
        let schema = FormSchema::compile(&fields).unwrap();

        let errors = schema
            .validate(&answers(json!({
                "postal_code": "1234",
                "last_tetanus": "2010-06-01",
                "doctor_phone": "call me"
            })))
            .unwrap_err();
        assert_eq!(errors[0].message, "Use a 5 digit postal code");
        assert_eq!(errors[1].field, "last_tetanus");
        assert_eq!(errors[2].field, "doctor_phone");

        let out = schema
            .validate(&answers(json!({
                "postal_code": "12345",
                "last_tetanus": "2020-03-04",
                "doctor_phone": "+1 (555) 010-9999"
            })))
            .unwrap();
        assert_eq!(out["last_tetanus"], json!("2020-03-04"));
    }

    #[test]
    fn test_compile_rejects_bad_definitions() {
        let dup = vec![
            FieldDefinition::new("name", "Name", FieldType::Text),
            FieldDefinition::new("name", "Name again", FieldType::Text),
        ];
        assert_eq!(
            FormSchema::compile(&dup).unwrap_err(),
            SchemaError::DuplicateKey("name".into())
        );

        let bad_key = vec![FieldDefinition::new("First Name", "Name", FieldType::Text)];
        assert!(matches!(
            FormSchema::compile(&bad_key),
            Err(SchemaError::InvalidKey(_))
        ));

        let no_options = vec![FieldDefinition::new("size", "Size", FieldType::Select)];
        assert_eq!(
            FormSchema::compile(&no_options).unwrap_err(),
            SchemaError::MissingOptions("size".into())
        );

        let bad_pattern = vec![FieldDefinition::new("code", "Code", FieldType::Text).with_rules(
            ValidationRules {
                pattern: Some("([a-z".into()),
                ..Default::default()
            },
        )];
        assert!(matches!(
            FormSchema::compile(&bad_pattern),
            Err(SchemaError::InvalidPattern { .. })
        ));

        let inverted = vec![FieldDefinition::new("age", "Age", FieldType::Number).with_rules(
            ValidationRules {
                min: Some(10.0),
                max: Some(5.0),
                ..Default::default()
            },
        )];
        assert!(matches!(
            FormSchema::compile(&inverted),
            Err(SchemaError::InvalidBounds { rule: "min", .. })
        ));

        let forward = vec![
            FieldDefinition::new("details", "Details", FieldType::Text).shown_if(Condition {
                field: "later".into(),
                operator: ConditionOperator::IsNotEmpty,
                value: Value::Null,
            }),
            FieldDefinition::new("later", "Later", FieldType::Text),
        ];
        assert!(matches!(
            FormSchema::compile(&forward),
            Err(SchemaError::InvalidCondition { .. })
        ));

        let empty_in = vec![
            FieldDefinition::new("a", "A", FieldType::Text),
            FieldDefinition::new("b", "B", FieldType::Text).shown_if(Condition {
                field: "a".into(),
                operator: ConditionOperator::In,
                value: json!([]),
            }),
        ];
        assert!(matches!(
            FormSchema::compile(&empty_in),
            Err(SchemaError::InvalidConditionValue { .. })
        ));
    }

    #[test]
    fn test_answers_from_pairs() {
        let schema = FormSchema::compile(&registration_fields()).unwrap();
        let pairs: Vec<(String, String)> = vec![
            ("contact_email".into(), "a@b.co".into()),
            ("activities".into(), "canoe".into()),
            ("activities".into(), "crafts".into()),
            ("has_allergies".into(), "on".into()),
            ("child_id".into(), "ignored".into()),
        ];
        let answers = schema.answers_from_pairs(&pairs);
        assert_eq!(answers["activities"], json!(["canoe", "crafts"]));
        assert_eq!(answers["has_allergies"], json!("on"));
        assert!(!answers.contains_key("child_id"));
    }
}
