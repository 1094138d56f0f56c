//! Core library for invoicer
//!
//! This crate implements the **Functional Core** of the invoicer application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! The invoicer project uses a three-crate architecture:
//!
//! - **`invoicer_core`** (this crate): Pure transformation functions with zero I/O
//! - **`pdf`**: Document I/O (layout extraction, font embedding, redaction)
//! - **`invoicer`**: Orchestration, the oracle client and the CLI (the Imperative Shell)
//!
//! ## Functional Core Principles
//!
//! - **Pure functions**: Same input always produces the same output
//! - **No side effects**: No I/O operations, no external state mutations
//! - **Testable**: Can be tested with simple fixture data, no mocking required
//!
//! # Module Organization
//!
//! - [`layout`]: Text spans and bounding boxes shared by every stage
//! - [`oracle`]: Prompt framing and response parsing for the field classifier
//! - [`fields`]: Field maps, the editable-field projection and replacement planning
//! - [`fonts`]: Font-map resolution and font-name normalization
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use invoicer_core::fields::{plan_replacements, project_editable_fields};
//! use invoicer_core::oracle::parse_field_map;
//!
//! let fields = parse_field_map(raw_response)?;
//! let editable = project_editable_fields(&fields);
//! let plan = plan_replacements(&editable, &changes);
//! ```

pub mod fields;
pub mod fonts;
pub mod layout;
pub mod oracle;
