//! Schema-driven record extraction.
//!
//! A [`SchemaFieldMap`] declares fields as `(SemanticType, Selector)` pairs.
//! The [`Extractor`] walks that declaration over any [`DocumentBackend`],
//! static HTML or a live browser session alike, and produces an
//! [`ExtractedRecord`].

pub mod backend;
pub mod duration;
pub mod engine;
pub mod error;
pub mod record;
pub mod schema;

pub use backend::{
    format_cookies, Cookie, DocumentBackend, LiveBackend, LiveNode, LiveOptions, ResourceClass,
    StaticBackend, StaticNode, WaitCondition,
};
pub use duration::parse_duration;
pub use engine::Extractor;
pub use error::{ExtractError, Result};
pub use record::{ExtractedRecord, Value};
pub use schema::{FieldSpec, ScalarType, SchemaFieldMap, Selector, SemanticType};
