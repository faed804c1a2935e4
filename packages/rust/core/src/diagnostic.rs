//! Reportable description of an unexpected failure.
//!
//! Panics are caught through [`catch_panic`], which records the backtrace
//! from inside the panic hook, while the panicking frames are still on the
//! stack. Errors carry no trace of their own, so [`Diagnostic::from_error`]
//! captures one where the error is handled and says so in the report,
//! alongside the error's `source` chain.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::error::Error as _;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::Once;

use hostlink_shared::HostlinkError;

// ---------------------------------------------------------------------------
// Panic-site backtraces
// ---------------------------------------------------------------------------

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chain a hook in front of the current one. It only records a trace on
/// threads currently inside [`catch_panic`]; everything else sees the
/// previous hook unchanged.
fn install_trace_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            if CAPTURING.try_with(Cell::get).unwrap_or(false) {
                let trace = Backtrace::force_capture().to_string();
                let _ = PANIC_TRACE.try_with(|slot| slot.replace(Some(trace)));
            }
            previous(info);
        }));
    });
}

/// Run `f`, turning a panic into a [`Diagnostic`] whose trace points at the
/// panic site.
pub(crate) fn catch_panic<R>(f: impl FnOnce() -> R) -> std::result::Result<R, Diagnostic> {
    install_trace_hook();
    let _ = PANIC_TRACE.take();
    let outer = CAPTURING.replace(true);
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.set(outer);

    outcome.map_err(|payload| Diagnostic::from_panic(payload, PANIC_TRACE.take()))
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// Where [`Diagnostic::trace`] was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOrigin {
    /// At the point of failure.
    FailureSite,
    /// Where the error reached the controller's boundary.
    Boundary,
}

/// Kind, message and stack trace of a failure that escaped to the
/// controller's top-level boundary.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: String,
    pub message: String,
    /// `source()` chain of the error, outermost first. Empty for panics.
    pub causes: Vec<String>,
    pub trace: String,
    pub origin: TraceOrigin,
}

impl Diagnostic {
    pub fn from_error(err: &HostlinkError) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            causes,
            trace: Backtrace::force_capture().to_string(),
            origin: TraceOrigin::Boundary,
        }
    }

    /// `trace` is the backtrace recorded by the panic hook, if one ran.
    pub fn from_panic(payload: Box<dyn Any + Send>, trace: Option<String>) -> Self {
        let (trace, origin) = match trace {
            Some(trace) => (trace, TraceOrigin::FailureSite),
            None => (Backtrace::force_capture().to_string(), TraceOrigin::Boundary),
        };
        Self {
            kind: "Panic".to_string(),
            message: panic_message(payload.as_ref()),
            causes: Vec::new(),
            trace,
            origin,
        }
    }

    /// Text for the host's error channel.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Message: There was a problem starting the pipeline engine.\n\
             Please contact your pipeline support team.\n\n\
             Error: {} - {}\n",
            self.kind, self.message
        );
        for cause in &self.causes {
            out.push_str(&format!("Caused by: {cause}\n"));
        }
        match self.origin {
            TraceOrigin::FailureSite => out.push_str("Backtrace (most recent call first):\n"),
            TraceOrigin::Boundary => out.push_str(
                "Backtrace at the transition boundary, not the failure site \
                 (most recent call first):\n",
            ),
        }
        out.push_str(&self.trace);
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Best-effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
