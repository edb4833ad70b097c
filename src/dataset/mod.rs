//! Conflict datasets stored as JSON-Lines.

pub mod item;
pub mod loader;
pub mod locator;

pub use item::{ConflictTuple, WorkItem};
pub use loader::{extract_matching, load_work_items, DatasetError, DatasetResult};
pub use locator::DatasetLocator;
