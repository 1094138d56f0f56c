//! Reading side of the document: the lopdf backend, font metrics and the
//! positional text extractor.

pub mod backend;
pub mod layout;
pub mod metrics;
