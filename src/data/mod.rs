//! Data module: per-site field storage and the field set of a run.

pub mod field;
pub mod field_set;

pub use field::{Field, FieldKind, MAX_DOFS, SiteValue};
pub use field_set::FieldSet;
