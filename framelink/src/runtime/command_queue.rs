use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::RemoteError;

/// Runs a queued script body on the main loop thread.
pub trait ScriptExecutor {
    fn execute(&mut self, script: &str) -> Result<(), String>;
}

impl<F> ScriptExecutor for F
where
    F: FnMut(&str) -> Result<(), String>,
{
    fn execute(&mut self, script: &str) -> Result<(), String> {
        self(script)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DrainReport {
    pub executed: usize,
    pub failed: usize,
}

/// Global FIFO of script bodies submitted from any thread.
#[derive(Default)]
pub struct CommandQueue {
    pending: Mutex<VecDeque<String>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: impl Into<String>) {
        self.pending.lock().push_back(command.into());
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Executes every command queued before this call, oldest first.
    /// Commands pushed while draining wait for the next call. A failing or
    /// panicking command is logged and does not affect the others.
    pub fn drain_and_execute(
        &self,
        executor: &mut dyn ScriptExecutor,
    ) -> DrainReport {
        let batch = std::mem::take(&mut *self.pending.lock());
        let mut report = DrainReport::default();

        for command in batch {
            debug!("Executing 'run-js' request: '{}'", command);

            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| {
                    executor.execute(&command)
                }))
                .unwrap_or_else(|payload| Err(panic_message(payload)));

            report.executed += 1;

            if let Err(err) = outcome {
                report.failed += 1;
                warn!("{}", RemoteError::ScriptExecutionFailed(err));
            }
        }

        report
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("executor panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("executor panicked: {}", message)
    } else {
        "executor panicked".to_string()
    }
}
