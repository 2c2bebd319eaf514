mod interval;
mod task;

pub use interval::IntervalTimer;
pub use task::{TaskHandle, TaskPanicked, panic_message, spawn_task};
