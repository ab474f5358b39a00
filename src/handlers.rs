//! Ordered, failure-isolated event handler lists.
//!
//! Handlers run synchronously in registration order. A handler that returns
//! `Err` or panics is recorded as a [`HandlerFailure`] and the remaining
//! handlers still receive the same event.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::anyhow;

/// Boxed event handler.
pub type Handler<E> = Box<dyn FnMut(&E) -> anyhow::Result<()> + Send>;

/// A handler invocation that failed during dispatch.
#[derive(Debug)]
pub struct HandlerFailure {
    /// Handler family, e.g. `click` or `drag_end`.
    pub family: &'static str,
    /// Registration index within the family.
    pub index: usize,
    pub error: anyhow::Error,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} handler #{} failed: {:#}", self.family, self.index, self.error)
    }
}

/// Outcome of dispatching one inbound event.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of handlers that were invoked.
    pub invoked: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handlers of one event family.
pub struct HandlerList<E> {
    family: &'static str,
    handlers: Vec<Handler<E>>,
}

impl<E> HandlerList<E> {
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            handlers: Vec::new(),
        }
    }

    pub fn push(&mut self, handler: Handler<E>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke every handler with `event`, appending failures to `report`.
    pub fn dispatch(&mut self, event: &E, report: &mut DispatchReport) {
        for (index, handler) in self.handlers.iter_mut().enumerate() {
            report.invoked += 1;
            let error = match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(payload) => anyhow!("handler panicked: {}", panic_message(payload)),
            };
            let failure = HandlerFailure {
                family: self.family,
                index,
                error,
            };
            log::error!("{}", failure);
            report.failures.push(failure);
        }
    }
}

impl<E> fmt::Debug for HandlerList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerList")
            .field("family", &self.family)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
