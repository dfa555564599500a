pub(crate) mod async_task;
pub mod duration;

pub use async_task::shutdown_on_error;
pub use duration::parse_duration;

#[cfg(test)]
mod async_task_test;
