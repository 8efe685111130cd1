//! Delivery of shutdown triggers to the coordinator.
//!
//! # Responsibilities
//! - Listen for SIGINT and SIGTERM
//! - Forward panics from any thread
//! - Forward supervised tasks that end in an error
//!
//! # Design Decisions
//! - Every source feeds one unbounded channel; a single dispatcher calls the coordinator
//! - The panic hook chains to the previous hook so the panic is still printed

use std::fmt::Display;
use std::panic::PanicHookInfo;
use std::sync::Arc;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{ProcessExit, ShutdownCoordinator, ShutdownTrigger};
use crate::net::ListenerHandle;

/// Cloneable handle for reporting shutdown triggers.
#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: mpsc::UnboundedSender<ShutdownTrigger>,
}

impl TriggerSender {
    /// Report a trigger; ignored once the dispatcher is gone.
    pub fn report(&self, trigger: ShutdownTrigger) {
        let _ = self.tx.send(trigger);
    }
}

/// Create the trigger channel.
pub fn channel() -> (TriggerSender, mpsc::UnboundedReceiver<ShutdownTrigger>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TriggerSender { tx }, rx)
}

/// Route panics to the coordinator in addition to the existing hook.
pub fn install_panic_hook(sender: TriggerSender) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        previous(info);
        sender.report(ShutdownTrigger::Panic(panic_message(info)));
    }));
}

/// Human-readable panic description with location.
pub fn panic_message(info: &PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());

    match info.location() {
        Some(location) => format!("{message} at {}:{}", location.file(), location.line()),
        None => message,
    }
}

/// Report a task failure if `task` ends in an error or panics.
pub fn watch_task<T, Err>(name: &'static str, task: JoinHandle<Result<T, Err>>, sender: TriggerSender)
where
    T: Send + 'static,
    Err: Display + Send + 'static,
{
    tokio::spawn(async move {
        let failure = match task.await {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(format!("{name}: {e}")),
            Err(join_error) => Some(format!("{name}: {join_error}")),
        };
        if let Some(message) = failure {
            tracing::error!(task = name, error = %message, "Supervised task failed");
            sender.report(ShutdownTrigger::TaskFailure(message));
        } else {
            tracing::debug!(task = name, "Supervised task finished");
        }
    });
}

/// Wait for triggers from signals and the channel, handing each to the coordinator.
///
/// Runs until the process exits. Each trigger is handled on its own task so a
/// second trigger is logged while the first is still closing the listener.
/// Signal streams are registered once up front so a signal arriving between
/// two triggers is queued rather than lost.
pub async fn dispatch<H, E>(
    coordinator: Arc<ShutdownCoordinator<H, E>>,
    mut triggers: mpsc::UnboundedReceiver<ShutdownTrigger>,
) where
    H: ListenerHandle,
    E: ProcessExit + 'static,
{
    let mut signals = SignalStreams::install();
    let mut channel_open = true;

    loop {
        let trigger = tokio::select! {
            trigger = signals.recv() => trigger,
            received = triggers.recv(), if channel_open => match received {
                Some(trigger) => trigger,
                None => {
                    // All senders dropped; only signals remain.
                    channel_open = false;
                    continue;
                }
            },
        };

        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator.shutdown(trigger).await;
        });
    }
}

#[cfg(unix)]
struct SignalStreams {
    interrupt: Option<Signal>,
    terminate: Option<Signal>,
}

#[cfg(unix)]
impl SignalStreams {
    fn install() -> Self {
        Self {
            interrupt: register(SignalKind::interrupt(), "SIGINT"),
            terminate: register(SignalKind::terminate(), "SIGTERM"),
        }
    }

    async fn recv(&mut self) -> ShutdownTrigger {
        tokio::select! {
            _ = next_signal(&mut self.interrupt) => ShutdownTrigger::Interrupt,
            _ = next_signal(&mut self.terminate) => ShutdownTrigger::Terminate,
        }
    }
}

#[cfg(unix)]
fn register(kind: SignalKind, name: &'static str) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(err) => {
            tracing::warn!(?err, signal = name, "Failed to install signal handler");
            None
        }
    }
}

#[cfg(unix)]
async fn next_signal(stream: &mut Option<Signal>) {
    match stream {
        Some(stream) => {
            if stream.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
struct SignalStreams;

#[cfg(not(unix))]
impl SignalStreams {
    fn install() -> Self {
        Self
    }

    async fn recv(&mut self) -> ShutdownTrigger {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(?err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        ShutdownTrigger::Interrupt
    }
}
