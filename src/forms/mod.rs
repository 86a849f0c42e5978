//! Dynamic forms: admin-authored field definitions compiled into a runtime
//! validator.
//!
//! Definitions are stored as JSON on `form_definitions.fields`. Publishing copies
//! them into an immutable `form_versions` snapshot; submissions are always
//! validated against a snapshot, never against the editable draft.

pub mod field;
pub mod schema;

pub use field::{
    Condition, ConditionOperator, FieldDefinition, FieldOption, FieldType, ValidationRules,
};
pub use schema::{FieldError, FormSchema, SchemaError};
