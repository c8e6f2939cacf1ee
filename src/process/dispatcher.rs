/*!
 * Dispatcher
 *
 * Trampoline that runs one process on the shared dispatch stack until it
 * suspends or ends, then returns to the simulation loop.
 *
 * The dispatcher itself always executes on the native thread stack. A
 * process image is therefore copied back while the dispatcher's own frames
 * are safely elsewhere, and only then does control jump into it. Every
 * suspension comes back here first, so the stack bytes are captured after
 * the process has stopped touching them.
 */

use super::handle::Process;
use super::types::{ProcessStatus, TerminateSignal};
use crate::context::arch::{self, Registers};
use crate::context::{fatal, SavedContext};
use crate::core::errors::{ProcessError, SimError};
use crate::core::limits::{DISPATCH_CANARY_SALT, SUSPEND_CANARY};
use crate::core::types::{ProcessId, SimResult};
use crate::monitoring::DispatchSpan;
use crate::scheduler::kernel::Kernel;
use std::any::Any;
use std::cell::{Cell, RefCell, UnsafeCell};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use tracing::{debug, error, warn};

/// How a dispatched process handed control back
enum Outcome {
    Suspended,
    Returned(SimResult<()>),
    Terminated,
    Panicked(Box<dyn Any + Send + 'static>),
}

/// State shared between the dispatcher and the process it is running
///
/// Lives on the heap for the duration of one dispatch; a resumed process
/// sees a different session than the one it suspended in.
struct Session {
    process: Process,
    dispatcher: UnsafeCell<Registers>,
    suspended: UnsafeCell<Registers>,
    outcome: RefCell<Option<Outcome>>,
    cancel: bool,
}

thread_local! {
    static SESSION: Cell<*const Session> = const { Cell::new(ptr::null()) };
}

/// Marks a dispatch as in progress on this thread
struct SessionGuard;

impl SessionGuard {
    fn enter(session: &Session) -> SimResult<Self> {
        SESSION.with(|slot| {
            if !slot.get().is_null() {
                return Err(ProcessError::ReentrantDispatch.into());
            }
            slot.set(session as *const Session);
            Ok(SessionGuard)
        })
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        SESSION.with(|slot| slot.set(ptr::null()));
    }
}

fn current_session<'a>() -> Option<&'a Session> {
    let raw = SESSION.with(Cell::get);
    // SAFETY: the pointer is set only while its Box is alive in run_session
    unsafe { raw.as_ref() }
}

/// Whether a dispatch is running on this thread
pub(crate) fn is_active() -> bool {
    SESSION.with(|slot| !slot.get().is_null())
}

/// Id of the process currently executing, if any
pub(crate) fn current_process_id() -> Option<ProcessId> {
    current_session().map(|s| s.process.id())
}

impl Kernel {
    /// Run `process` until it suspends or ends
    ///
    /// Starts a Prepared process at the beginning of its behavior, resumes
    /// an Interrupted one right after the primitive that suspended it.
    pub(crate) fn dispatch(&self, process: &Process) -> SimResult<ProcessStatus> {
        if is_active() {
            return Err(ProcessError::ReentrantDispatch.into());
        }
        if !std::ptr::eq(process.weak_kernel().as_ptr(), self) {
            return Err(ProcessError::ForeignProcess(process.id()).into());
        }
        let status = process.status();
        if !status.is_dispatchable() {
            return Err(ProcessError::NotDispatchable {
                id: process.id(),
                status,
            }
            .into());
        }
        let context = process.take_context();
        self.run_session(process, context, false)?;
        Ok(process.status())
    }

    /// Unwind every process terminated while suspended
    ///
    /// Each one is resumed once with its session cancelled, so its frames
    /// drop their values and the image can be discarded.
    pub(crate) fn drain_reaper(&self) {
        if is_active() {
            return;
        }
        loop {
            let next = self.reaper.borrow_mut().pop();
            let Some((process, context)) = next else { break };
            debug!(pid = process.id(), "reaping cancelled process");
            if let Err(err) = self.run_session(&process, Some(context), true) {
                warn!(pid = process.id(), error = %err, "cancelled process ended with an error");
            }
            self.stats.borrow_mut().reaped += 1;
        }
    }

    fn run_session(
        &self,
        process: &Process,
        context: Option<SavedContext>,
        cancel: bool,
    ) -> SimResult<()> {
        let session = Box::new(Session {
            process: process.clone(),
            dispatcher: UnsafeCell::new(Registers::default()),
            suspended: UnsafeCell::new(Registers::default()),
            outcome: RefCell::new(None),
            cancel,
        });
        let guard = SessionGuard::enter(&session)?;
        let span = self
            .config
            .log_dispatch
            .then(|| DispatchSpan::new(process.id(), &process.name(), process.status()));

        let sentinel = process.id() ^ DISPATCH_CANARY_SALT;
        let mut canary = 0u64;
        // SAFETY: plain local
        unsafe { ptr::write_volatile(&mut canary, sentinel) };

        let target = match context {
            Some(saved) => {
                let bytes = saved.len();
                let mut stats = self.stats.borrow_mut();
                stats.resumes += 1;
                stats.bytes_restored += bytes as u64;
                drop(stats);
                // SAFETY: we run on the native stack, disjoint from the dispatch stack
                unsafe { saved.restore(&self.stack) }
            }
            None => {
                self.stats.borrow_mut().starts += 1;
                // SAFETY: the top of the dispatch stack is 16-byte aligned
                unsafe { Registers::fresh(self.stack.top(), process_entry) }
            }
        };
        if !cancel {
            process.set_status(ProcessStatus::Running);
        }
        self.stats.borrow_mut().dispatches += 1;

        // SAFETY: the session outlives the switch; target is fully in place
        unsafe { arch::switch_context(session.dispatcher.get(), &target) };

        // SAFETY: plain local
        if unsafe { ptr::read_volatile(&canary) } != sentinel {
            fatal("dispatcher frame canary clobbered");
        }
        if !self.stack.check_guard() {
            fatal("dispatch stack overflowed into its guard zone");
        }

        let outcome = session.outcome.borrow_mut().take();
        let result = match outcome {
            Some(Outcome::Suspended) => {
                if cancel {
                    fatal("cancelled process suspended again");
                }
                // SAFETY: the process has switched away; nothing ran on the stack since
                let saved = unsafe { SavedContext::capture(&self.stack, *session.suspended.get()) };
                {
                    let mut stats = self.stats.borrow_mut();
                    stats.suspensions += 1;
                    stats.bytes_captured += saved.len() as u64;
                    stats.peak_image_bytes = stats.peak_image_bytes.max(saved.len() as u64);
                }
                if cfg!(debug_assertions) {
                    self.scrub(saved.len());
                }
                process.store_context(saved);
                process.set_status(ProcessStatus::Interrupted);
                Ok(())
            }
            Some(Outcome::Returned(result)) => {
                if !cancel {
                    self.finalize(process);
                }
                if let Err(err) = &result {
                    warn!(pid = process.id(), error = %err, "behavior returned an error");
                }
                result
            }
            Some(Outcome::Terminated) => {
                if !cancel {
                    self.finalize(process);
                }
                Ok(())
            }
            Some(Outcome::Panicked(payload)) => {
                if !cancel {
                    self.finalize(process);
                }
                drop(span);
                drop(guard);
                if cancel {
                    error!(pid = process.id(), "behavior panicked while being cancelled");
                    return Err(ProcessError::Panicked(process.id()).into());
                }
                panic::resume_unwind(payload);
            }
            None => fatal("process switched back without reporting"),
        };

        if let Some(span) = &span {
            span.record_status(process.status());
        }
        drop(span);
        drop(guard);
        result
    }

    /// Overwrite the region just captured, so stale frames fail loudly
    fn scrub(&self, len: usize) {
        // SAFETY: [top - len, top) lies within the stack and nothing occupies it
        unsafe { ptr::write_bytes(self.stack.top().sub(len), 0xCC, len) };
    }
}

/// First frame of every process on the dispatch stack
extern "C" fn process_entry() -> ! {
    run_behavior();

    let Some(session) = current_session() else {
        fatal("process ended outside of a dispatch");
    };
    // SAFETY: the dispatcher registers were saved by the switch that got us here
    unsafe { arch::switch_context(session.suspended.get(), session.dispatcher.get()) };
    fatal("terminated process resumed")
}

/// Call the behavior and record how it ended
///
/// All values of the process are dropped before this returns; the entry
/// frame that called it holds nothing.
#[inline(never)]
fn run_behavior() {
    let outcome = {
        let Some(session) = current_session() else {
            fatal("process started outside of a dispatch");
        };
        let process = session.process.clone();
        let outcome = match process.take_behavior() {
            None => Outcome::Returned(Ok(())),
            Some(behavior) => match panic::catch_unwind(AssertUnwindSafe(|| behavior(&process))) {
                Ok(result) => Outcome::Returned(result),
                Err(payload) if payload.is::<TerminateSignal>() => Outcome::Terminated,
                Err(payload) => Outcome::Panicked(payload),
            },
        };
        drop(process);
        outcome
    };

    // the session we started in may be long gone
    match current_session() {
        Some(session) => *session.outcome.borrow_mut() = Some(outcome),
        None => fatal("process ended outside of a dispatch"),
    }
}

/// Hand control back to the dispatcher from inside `process`
///
/// Returns once the dispatcher runs the process again. If the process was
/// terminated in the meantime, this never returns normally: the behavior
/// unwinds to its entry frame.
#[inline(never)]
pub(crate) fn suspend(process: &Process) -> SimResult<()> {
    let session = match current_session() {
        Some(session) if session.process.id() == process.id() => session,
        _ => return Err(ProcessError::NotCurrent(process.id()).into()),
    };
    if session.cancel {
        return Err(SimError::from(ProcessError::Terminated(process.id())));
    }

    let mut sentinel = 0u64;
    // SAFETY: plain local
    unsafe { ptr::write_volatile(&mut sentinel, SUSPEND_CANARY) };
    *session.outcome.borrow_mut() = Some(Outcome::Suspended);

    // SAFETY: the dispatcher registers were saved by the switch that got us here
    unsafe { arch::switch_context(session.suspended.get(), session.dispatcher.get()) };

    // SAFETY: plain local, restored from the saved image
    if unsafe { ptr::read_volatile(&sentinel) } != SUSPEND_CANARY {
        fatal("suspended frame canary clobbered on restore");
    }
    let Some(session) = current_session() else {
        fatal("process resumed outside of a dispatch");
    };
    if session.cancel {
        panic::resume_unwind(Box::new(TerminateSignal));
    }
    Ok(())
}
