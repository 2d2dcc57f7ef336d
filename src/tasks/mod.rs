pub mod notification_loop;
pub mod refresh_loop;
pub mod task_runner;
