//! Shutdown coordination for the server.
//!
//! The coordinator is the single place that ends the process. It is a plain
//! object: signal and panic delivery (see `signals.rs`) only call
//! [`ShutdownCoordinator::shutdown`], so tests can drive it directly.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use crate::lifecycle::startup::ListenerSlot;
use crate::net::ListenerHandle;
use crate::observability::LoggingGuard;

/// Exit status for an intentional, signal-triggered shutdown.
pub const EXIT_GRACEFUL: i32 = 0;

/// Exit status for a fault-triggered shutdown.
pub const EXIT_FAULT: i32 = 1;

/// What asked the process to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// A panic on any thread.
    Panic(String),
    /// A supervised task ended with an error.
    TaskFailure(String),
}

impl ShutdownTrigger {
    pub fn is_fault(&self) -> bool {
        matches!(self, ShutdownTrigger::Panic(_) | ShutdownTrigger::TaskFailure(_))
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_fault() {
            EXIT_FAULT
        } else {
            EXIT_GRACEFUL
        }
    }
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Interrupt => write!(f, "SIGINT"),
            ShutdownTrigger::Terminate => write!(f, "SIGTERM"),
            ShutdownTrigger::Panic(msg) => write!(f, "panic: {msg}"),
            ShutdownTrigger::TaskFailure(msg) => write!(f, "task failure: {msg}"),
        }
    }
}

/// Terminates the process.
pub trait ProcessExit: Send + Sync {
    fn exit(&self, code: i32);
}

impl<E: ProcessExit + ?Sized> ProcessExit for Arc<E> {
    fn exit(&self, code: i32) {
        (**self).exit(code);
    }
}

/// Exits through `std::process::exit`, flushing file logs first.
#[derive(Debug, Default)]
pub struct StdProcessExit {
    logs: Mutex<Option<LoggingGuard>>,
}

impl StdProcessExit {
    pub fn new(logs: LoggingGuard) -> Self {
        Self {
            logs: Mutex::new(Some(logs)),
        }
    }
}

impl ProcessExit for StdProcessExit {
    fn exit(&self, code: i32) {
        // Dropping the guard flushes the non-blocking writers.
        drop(self.logs.lock().unwrap_or_else(PoisonError::into_inner).take());
        std::process::exit(code);
    }
}

/// Closes the active listener and exits, once.
pub struct ShutdownCoordinator<H, E> {
    listener: Weak<ListenerSlot<H>>,
    exit: E,
    close_timeout: Duration,
    started: AtomicBool,
}

impl<H: ListenerHandle, E: ProcessExit> ShutdownCoordinator<H, E> {
    /// `listener` comes from `ListenerSupervisor::listener_ref`.
    pub fn new(listener: Weak<ListenerSlot<H>>, exit: E, close_timeout: Duration) -> Self {
        Self {
            listener,
            exit,
            close_timeout,
            started: AtomicBool::new(false),
        }
    }

    /// Whether a shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Handle a trigger.
    ///
    /// Returns `false` when another trigger already owns the shutdown; that
    /// call neither closes the listener nor exits.
    pub async fn shutdown(&self, trigger: ShutdownTrigger) -> bool {
        if trigger.is_fault() {
            tracing::error!(trigger = %trigger, "Fatal fault, shutting down");
        } else {
            tracing::info!(trigger = %trigger, "Received shutdown signal, closing server");
        }

        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!(trigger = %trigger, "Shutdown already in progress, ignoring trigger");
            return false;
        }

        self.close_listener().await;

        let code = trigger.exit_code();
        tracing::info!(exit_code = code, "Exiting");
        self.exit.exit(code);
        true
    }

    /// Claim the shutdown for a non-signal exit, such as a failed startup.
    ///
    /// Returns `false`, without exiting, when a trigger already owns the shutdown.
    fn claim_exit(&self, code: i32) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!(exit_code = code, "Shutdown already in progress, not exiting again");
            return false;
        }
        tracing::info!(exit_code = code, "Exiting");
        self.exit.exit(code);
        true
    }

    async fn close_listener(&self) {
        let Some(handle) = self.listener.upgrade().and_then(|slot| slot.current()) else {
            tracing::debug!("No bound listener to close");
            return;
        };
        if !handle.is_open() {
            tracing::debug!("Listener already closed");
            return;
        }

        match tokio::time::timeout(self.close_timeout, handle.close()).await {
            Ok(()) => tracing::info!(address = %handle.local_addr(), "Server closed successfully"),
            Err(_) => tracing::warn!(
                address = %handle.local_addr(),
                timeout_ms = self.close_timeout.as_millis() as u64,
                "Listener close timed out, exiting anyway"
            ),
        }
    }
}

/// Lets startup report its failure through the same once-only latch as the
/// shutdown triggers.
impl<H: ListenerHandle, E: ProcessExit> ProcessExit for ShutdownCoordinator<H, E> {
    fn exit(&self, code: i32) {
        self.claim_exit(code);
    }
}
