pub mod api_keys;
pub mod completed_tasks;
