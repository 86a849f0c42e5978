use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    Email,
    Phone,
    Number,
    Date,
    Select,
    Radio,
    MultiSelect,
    Checkbox,
    Signature,
    /// Display-only section heading; never carries a value.
    Heading,
}

impl FieldType {
    pub fn has_options(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio | FieldType::MultiSelect)
    }

    pub fn is_input(self) -> bool {
        self != FieldType::Heading
    }

    pub fn is_textual(self) -> bool {
        matches!(
            self,
            FieldType::Text
                | FieldType::Textarea
                | FieldType::Email
                | FieldType::Phone
                | FieldType::Signature
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
    pub pattern_message: Option<String>,
    pub min_date: Option<String>,
    pub max_date: Option<String>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    In,
    IsChecked,
    IsNotEmpty,
}

/// Shows the owning field only when the controlling field's value matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub validation: ValidationRules,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if: Option<Condition>,
}

impl FieldDefinition {
    pub fn new(key: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            field_type,
            required: false,
            help_text: None,
            placeholder: None,
            options: Vec::new(),
            validation: ValidationRules::default(),
            show_if: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options(mut self, values: &[(&str, &str)]) -> Self {
        self.options = values
            .iter()
            .map(|(value, label)| FieldOption {
                value: value.to_string(),
                label: label.to_string(),
            })
            .collect();
        self
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.validation = rules;
        self
    }

    pub fn shown_if(mut self, condition: Condition) -> Self {
        self.show_if = Some(condition);
        self
    }

    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_json_shape() {
        let raw = serde_json::json!({
            "key": "tshirt",
            "label": "T-shirt size",
            "field_type": "select",
            "required": true,
            "options": [{ "value": "s", "label": "Small" }],
            "show_if": { "field": "wants_shirt", "operator": "is_checked" }
        });
        let field: FieldDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(field.field_type, FieldType::Select);
        assert!(field.has_option("s"));
        assert_eq!(field.validation, ValidationRules::default());
        let cond = field.show_if.unwrap();
        assert_eq!(cond.operator, ConditionOperator::IsChecked);
        assert!(cond.value.is_null());
    }
}
