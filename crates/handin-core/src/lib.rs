pub mod api_key;
pub mod caller;
pub mod completed_task;
pub mod pagination;

pub use caller::{Caller, Role};
pub use completed_task::{CompletedTask, CompletedTaskFilter, CreateCompletedTask, TaskFile};
pub use pagination::{PageRequest, Pagination};
