//! Oracle field maps and the transformations that turn them into edits.
//!
//! ```text
//! FieldMap  ->  EditableField[]  ->  ReplacementPlan
//!          project             plan (+ caller changes)
//! ```

pub mod plan;
pub mod project;
pub mod types;

pub use plan::{
    fields_found, plan_replacements, ChangeValue, Changes, PlannedReplacement, ReplacementPlan,
    ReplacementResult, DEFAULT_FONT_SIZE,
};
pub use project::project_editable_fields;
pub use types::{value_to_string, EditableField, FieldEntry, FieldMap, FieldValue};
