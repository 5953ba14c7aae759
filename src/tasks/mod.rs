//! Task model and persistent task collection.

pub mod store;
pub mod types;

pub use store::{TASKS_KEY, TaskStore};
pub use types::{EstimateUnit, Priority, Task, TaskStatus};
