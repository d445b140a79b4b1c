//! Views: alternative shapes of an entity, compiled once per
//! (entity type, view type) pair into a dispatch table.

pub mod compiler;
pub mod view;
pub mod wrapper;

pub use compiler::{AdapterCache, CompiledView};
pub use view::{View, ViewMethod, ViewRef};
pub use wrapper::Adapter;
