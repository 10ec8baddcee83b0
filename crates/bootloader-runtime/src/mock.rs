use crate::command::{CommandRunner, Invocation};
use crate::RuntimeError;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

type Handler = dyn Fn(&Invocation, &mut dyn Write) -> Result<(), RuntimeError> + Send + Sync;

/// A [`CommandRunner`] that spawns nothing.
///
/// Every invocation is recorded in order. When a handler is installed it is
/// called with the invocation and the output sink, so tests can simulate a
/// tool writing its state file or printing structured output.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    handler: Option<Box<Handler>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&Invocation, &mut dyn Write) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Some(Box::new(handler)),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Invocations whose arguments start with `prefix`.
    pub fn calls_with(&self, prefix: &[&str]) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.has_args(prefix))
            .collect()
    }
}

impl std::fmt::Debug for RecordingRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingRunner")
            .field("calls", &self.call_count())
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation, stdout: &mut dyn Write) -> Result<(), RuntimeError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());
        match &self.handler {
            Some(handler) => handler(invocation, stdout),
            None => Ok(()),
        }
    }
}
