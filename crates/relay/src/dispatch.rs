//! The dispatch loop: walks the route table for one request.
//!
//! Middleware and routes live in one ordered [`RouteTable`]. For each request the
//! [`Dispatcher`] creates a [`Cursor`] at the first entry and repeatedly asks it for the next
//! entry whose path matcher and method filter both accept the request. The matched handler is
//! invoked with a [`Next`] continuation; only by spending it ([`Next::proceed`]) does the handler
//! let the loop go on. The loop is iterative, so an arbitrarily long chain of handlers that
//! always continue does not grow the stack.
//!
//! The chain ends when:
//! - the cursor runs past the last entry ([`ChainEnd::Exhausted`]); the response is left exactly
//!   as the last handler left it, the dispatcher never answers on its own
//! - a handler returns [`Flow::halt`] ([`ChainEnd::Halted`])
//! - a handler fails or panics, and the [`FaultPolicy`] decides what happens
//!   ([`ChainEnd::Faulted`] or a [`DispatchError`])

use crate::handler::HandlerError;
use crate::table::{RouteEntry, RouteTable};
use crate::{Request, Response};
use futures::FutureExt;
use http::{Method, StatusCode};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::{debug, error};

/// The continuation handed to a handler.
///
/// Spending it with [`Next::proceed`] is the only way to obtain a [`Flow`] that continues the
/// chain.
#[derive(Debug)]
pub struct Next {
    index: usize,
}

impl Next {
    pub(crate) fn new(index: usize) -> Self {
        Self { index }
    }

    /// Continues the chain at the entry after the current one.
    #[inline]
    pub fn proceed(self) -> Flow {
        Flow(Step::Continue)
    }

    /// Index of the route table entry currently running.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// What a handler tells the dispatcher once it is done.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow(Step);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Halt,
}

impl Flow {
    /// Ends the chain, typically because the response has been produced.
    #[inline]
    pub fn halt() -> Self {
        Flow(Step::Halt)
    }

    #[inline]
    pub fn is_continue(&self) -> bool {
        self.0 == Step::Continue
    }
}

/// Decides what a failing handler does to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Log the fault and answer with the status and an empty body, unless the response was
    /// already finalized. Dispatch returns `Ok` with [`ChainEnd::Faulted`].
    Respond(StatusCode),
    /// Stop the chain and hand the fault to the host as a [`DispatchError`].
    Propagate,
}

impl Default for FaultPolicy {
    fn default() -> Self {
        FaultPolicy::Respond(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Why a handler did not complete normally.
#[derive(Debug, Error)]
pub enum HandlerFault {
    #[error("handler returned error: {source}")]
    Error { source: HandlerError },

    #[error("handler panicked: {message}")]
    Panic { message: String },
}

impl HandlerFault {
    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_owned());
        HandlerFault::Panic { message }
    }
}

/// A handler fault surfaced under [`FaultPolicy::Propagate`].
#[derive(Debug, Error)]
#[error("route entry #{index} failed on {method} {path}")]
pub struct DispatchError {
    index: usize,
    method: Method,
    path: String,
    #[source]
    fault: HandlerFault,
}

impl DispatchError {
    /// Index of the route table entry whose handler failed.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fault(&self) -> &HandlerFault {
        &self.fault
    }
}

/// How the chain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEnd {
    /// The cursor ran past the last entry.
    Exhausted,
    /// A handler returned without continuing.
    Halted,
    /// A handler failed and the fault policy answered the request.
    Faulted,
}

/// Summary of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    invoked: usize,
    end: ChainEnd,
}

impl DispatchOutcome {
    /// Number of handlers invoked.
    pub fn invoked(&self) -> usize {
        self.invoked
    }

    pub fn end(&self) -> ChainEnd {
        self.end
    }
}

/// The per-request position in the route table. It only moves forward.
#[derive(Debug)]
pub struct Cursor<'t> {
    table: &'t RouteTable,
    position: usize,
}

impl<'t> Cursor<'t> {
    pub fn new(table: &'t RouteTable) -> Self {
        Self { table, position: 0 }
    }

    /// Current position, i.e. the index of the next entry that will be examined.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Advances past entries that do not match and yields the first one that does.
    ///
    /// Returns `None` once the cursor has run past the end of the table.
    pub fn next_match(&mut self, path: &str, method: &Method) -> Option<(usize, &'t RouteEntry)> {
        while self.position < self.table.len() {
            let index = self.position;
            self.position += 1;

            let entry = self.table.get(index)?;
            if entry.matches(path, method) {
                return Some((index, entry));
            }
        }
        None
    }
}

/// Runs requests through a route table.
#[derive(Debug)]
pub struct Dispatcher<'t> {
    table: &'t RouteTable,
    policy: FaultPolicy,
}

impl<'t> Dispatcher<'t> {
    pub fn new(table: &'t RouteTable, policy: FaultPolicy) -> Self {
        Self { table, policy }
    }

    pub async fn dispatch(&self, req: &mut Request, res: &mut Response) -> Result<DispatchOutcome, DispatchError> {
        let mut cursor = Cursor::new(self.table);
        let mut invoked = 0;

        // the path is read again at each step, a handler may have rewritten it
        while let Some((index, entry)) = cursor.next_match(req.path(), req.method()) {
            invoked += 1;
            debug!(index, path = req.path(), method = %req.method(), matcher = %entry.matcher(), "invoke handler");

            let invocation = AssertUnwindSafe(entry.handler().invoke(req, res, Next::new(index))).catch_unwind().await;

            let fault = match invocation {
                Ok(Ok(flow)) if flow.is_continue() => continue,
                Ok(Ok(_)) => return Ok(DispatchOutcome { invoked, end: ChainEnd::Halted }),
                Ok(Err(source)) => HandlerFault::Error { source },
                Err(payload) => HandlerFault::from_panic(payload),
            };

            return self.on_fault(index, req, res, fault).map(|end| DispatchOutcome { invoked, end });
        }

        Ok(DispatchOutcome { invoked, end: ChainEnd::Exhausted })
    }

    fn on_fault(
        &self,
        index: usize,
        req: &Request,
        res: &mut Response,
        fault: HandlerFault,
    ) -> Result<ChainEnd, DispatchError> {
        match self.policy {
            FaultPolicy::Respond(status) => {
                error!(
                    index,
                    path = req.path(),
                    method = %req.method(),
                    cause = %fault,
                    "handler fault, respond with {status}"
                );
                if !res.is_finished() {
                    res.reset();
                    res.set_status(status);
                    res.end();
                }
                Ok(ChainEnd::Faulted)
            }
            FaultPolicy::Propagate => {
                error!(index, path = req.path(), method = %req.method(), cause = %fault, "handler fault, propagate");
                Err(DispatchError { index, method: req.method().clone(), path: req.path().to_owned(), fault })
            }
        }
    }
}
