//! Named, tracked background tasks on dedicated threads.
//!
//! A [`TaskHandle`] is the join point for work spawned with [`spawn_task`]:
//! owners can poll it, wait for it with a deadline, or join it and learn
//! whether the body panicked.

use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task '{name}' panicked: {message}")]
pub struct TaskPanicked {
    pub name: String,
    pub message: String,
}

pub struct TaskHandle {
    name: String,
    done_rx: Receiver<()>,
    join: Option<JoinHandle<Result<(), String>>>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits up to `timeout` for the task body to return.
    ///
    /// Returns `true` when the body has finished (normally or by panic).
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    pub fn join(mut self) -> Result<(), TaskPanicked> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        let outcome = match join.join() {
            Ok(outcome) => outcome,
            Err(payload) => Err(panic_message(payload)),
        };
        outcome.map_err(|message| TaskPanicked {
            name: self.name.clone(),
            message,
        })
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Spawns `body` on a new thread named `name`.
///
/// A panic in `body` is caught and logged; it surfaces again from
/// [`TaskHandle::join`] instead of tearing down the caller.
pub fn spawn_task<F>(name: impl Into<String>, body: F) -> io::Result<TaskHandle>
where
    F: FnOnce() + Send + 'static,
{
    let name = name.into();
    let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
    let thread_name = name.clone();
    let join = thread::Builder::new().name(name.clone()).spawn(move || {
        // Dropping the sender on return is what wakes `wait`.
        let _done = done_tx;
        catch_unwind(AssertUnwindSafe(body)).map_err(|payload| {
            let message = panic_message(payload);
            error!(task = %thread_name, "task panicked: {message}");
            message
        })
    })?;
    Ok(TaskHandle {
        name,
        done_rx,
        join: Some(join),
    })
}

/// Extracts a human-readable message from a panic payload.
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "non-string panic payload".to_string()
}
