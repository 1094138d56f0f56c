//! Request framing and response parsing for the field-classifier oracle.
//!
//! The oracle itself lives in the shell; this module only knows how to turn
//! spans into a prompt and raw model text into a [`FieldMap`](crate::fields::FieldMap).

pub mod extract;
pub mod prompt;

use thiserror::Error;

pub use extract::{extract_envelope, parse_field_map};
pub use prompt::{build_preamble, build_prompt, FIELDS_TO_EXTRACT};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle returned an empty response")]
    EmptyResponse,
    #[error("oracle response is not a JSON object: {0}")]
    Format(String),
    #[error("cannot serialize layout spans: {0}")]
    Request(#[from] serde_json::Error),
}
