//! Query clauses and the selection builder that accumulates them.

pub mod selection;
pub mod spec;

pub use selection::Selection;
pub use spec::{Direction, FieldRef, Filter, FilterOp, Limit, OrderBy, QuerySpec};
