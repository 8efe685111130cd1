//! Startup orchestration: obtaining an exclusive bind on the configured port.
//!
//! # States
//! ```text
//! Idle → Reclaiming → Probing → Binding → Bound
//!          ↑              │          │
//!          └── busy ──────┴──────────┘   (next attempt after backoff)
//!
//! any state → Failed   (fatal error, or every attempt busy)
//! ```
//!
//! # Design Decisions
//! - Reclaim runs on every attempt, even the first: a different process may hold the port
//! - Busy at probe or at bind is retryable; every other error halts immediately
//! - The supervisor never exits the process; the caller decides (see [`start_or_exit`])

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::{Duration, SystemTime};

use crate::config::ServerConfig;
use crate::lifecycle::shutdown::ProcessExit;
use crate::net::{BindError, ListenerBinder, ListenerHandle, PortProbe, PortReclaimer, ProbeError};
use crate::observability::metrics;
use crate::resilience::{calculate_backoff, BackoffPolicy, Sleeper};

/// Exit status for retries exhausted.
pub const EXIT_RETRIES_EXHAUSTED: i32 = 1;

/// Exit status for configuration errors (sysexits `EX_CONFIG`).
pub const EXIT_CONFIGURATION: i32 = 78;

/// Why startup could not bind.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Retrying cannot help: bad TLS material, permission denied, unusable address.
    #[error("configuration error on attempt {attempt}: {source}")]
    Configuration {
        attempt: u32,
        #[source]
        source: FatalBind,
    },

    /// Every attempt found the port busy.
    #[error("port {port} still in use after {attempts} attempts")]
    RetriesExhausted { port: u16, attempts: u32 },
}

impl StartupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Configuration { .. } => EXIT_CONFIGURATION,
            StartupError::RetriesExhausted { .. } => EXIT_RETRIES_EXHAUSTED,
        }
    }
}

/// The non-retryable failure behind a [`StartupError::Configuration`].
#[derive(Debug, thiserror::Error)]
pub enum FatalBind {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Reclaiming,
    Probing,
    Binding,
    Bound,
    Failed,
}

impl SupervisorState {
    fn as_str(self) -> &'static str {
        match self {
            SupervisorState::Idle => "idle",
            SupervisorState::Reclaiming => "reclaiming",
            SupervisorState::Probing => "probing",
            SupervisorState::Binding => "binding",
            SupervisorState::Bound => "bound",
            SupervisorState::Failed => "failed",
        }
    }
}

/// Result of one reclaim/probe/bind cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Bound,
    PortBusy,
    OsError,
}

impl AttemptOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptOutcome::Bound => "bound",
            AttemptOutcome::PortBusy => "port_busy",
            AttemptOutcome::OsError => "os_error",
        }
    }
}

/// One entry of a startup sequence; discarded when the sequence ends.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub at: SystemTime,
}

impl AttemptRecord {
    fn new(attempt: u32, outcome: AttemptOutcome) -> Self {
        Self {
            attempt,
            outcome,
            at: SystemTime::now(),
        }
    }
}

/// Retry parameters for one supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub addr: SocketAddr,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub max_delay: Duration,
    pub backoff: BackoffPolicy,
}

impl SupervisorSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            addr: config.listener.socket_addr(),
            max_retries: config.startup.max_retries,
            retry_delay: config.startup.retry_delay(),
            max_delay: Duration::from_millis(config.startup.max_delay_ms),
            backoff: config.startup.backoff,
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        calculate_backoff(
            self.backoff,
            attempt,
            self.retry_delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
        )
    }
}

/// Holder of the single live listener.
///
/// The supervisor owns the slot; the shutdown coordinator keeps a `Weak` to it
/// and may only read the current handle in order to close it.
#[derive(Debug)]
pub struct ListenerSlot<H> {
    current: RwLock<Option<Arc<H>>>,
}

impl<H> ListenerSlot<H> {
    fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// The bound listener, if any.
    pub fn current(&self) -> Option<Arc<H>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take(&self) -> Option<Arc<H>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn store(&self, handle: Arc<H>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
}

/// Drives reclaim → probe → bind until the port is ours or attempts run out.
pub struct ListenerSupervisor<P, R, B: ListenerBinder, S> {
    settings: SupervisorSettings,
    probe: P,
    reclaimer: R,
    binder: B,
    sleeper: S,
    slot: Arc<ListenerSlot<B::Handle>>,
    state: SupervisorState,
}

impl<P, R, B, S> ListenerSupervisor<P, R, B, S>
where
    P: PortProbe,
    R: PortReclaimer<B::Handle>,
    B: ListenerBinder,
    S: Sleeper,
{
    pub fn new(settings: SupervisorSettings, probe: P, reclaimer: R, binder: B, sleeper: S) -> Self {
        Self {
            settings,
            probe,
            reclaimer,
            binder,
            sleeper,
            slot: Arc::new(ListenerSlot::new()),
            state: SupervisorState::Idle,
        }
    }

    /// Non-owning reference for the shutdown coordinator.
    pub fn listener_ref(&self) -> Weak<ListenerSlot<B::Handle>> {
        Arc::downgrade(&self.slot)
    }

    /// The bound listener, if startup succeeded.
    pub fn listener(&self) -> Option<Arc<B::Handle>> {
        self.slot.current()
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Run one startup sequence.
    ///
    /// Any listener held from an earlier sequence is closed by the first reclaim.
    pub async fn start(&mut self) -> Result<Arc<B::Handle>, StartupError> {
        let addr = self.settings.addr;
        let max_retries = self.settings.max_retries.max(1);
        let mut history: Vec<AttemptRecord> = Vec::with_capacity(max_retries as usize);

        tracing::info!(%addr, max_retries, "Starting listener");

        for attempt in 1..=max_retries {
            self.transition(SupervisorState::Reclaiming, attempt);
            let owned = self.slot.take();
            self.reclaimer.reclaim(addr, owned).await;

            self.transition(SupervisorState::Probing, attempt);
            let free = match self.probe.is_port_free(addr).await {
                Ok(free) => free,
                Err(e) => {
                    history.push(AttemptRecord::new(attempt, AttemptOutcome::OsError));
                    return Err(self.fail_fatal(attempt, e.into(), &history));
                }
            };

            let outcome = if free {
                self.transition(SupervisorState::Binding, attempt);
                match self.binder.bind(addr).await {
                    Ok(handle) => {
                        let handle = Arc::new(handle);
                        self.slot.store(Arc::clone(&handle));
                        history.push(AttemptRecord::new(attempt, AttemptOutcome::Bound));
                        self.transition(SupervisorState::Bound, attempt);
                        metrics::record_startup_attempt(AttemptOutcome::Bound);
                        tracing::info!(
                            address = %handle.local_addr(),
                            attempt,
                            attempts_used = history.len(),
                            "Secure server bound"
                        );
                        return Ok(handle);
                    }
                    Err(e) if e.is_addr_in_use() => {
                        tracing::warn!(port = addr.port(), attempt, "Port taken between probe and bind");
                        AttemptOutcome::PortBusy
                    }
                    Err(e) => {
                        history.push(AttemptRecord::new(attempt, AttemptOutcome::OsError));
                        return Err(self.fail_fatal(attempt, e.into(), &history));
                    }
                }
            } else {
                tracing::warn!(port = addr.port(), attempt, max_retries, "Port still in use after reclaim");
                AttemptOutcome::PortBusy
            };

            metrics::record_startup_attempt(outcome);
            history.push(AttemptRecord::new(attempt, outcome));

            if attempt < max_retries {
                let delay = self.settings.delay_after(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before next attempt");
                self.sleeper.sleep(delay).await;
            }
        }

        self.transition(SupervisorState::Failed, max_retries);
        tracing::error!(
            port = addr.port(),
            attempts = history.len(),
            outcomes = ?history.iter().map(|r| r.outcome.as_str()).collect::<Vec<_>>(),
            "All server start attempts failed"
        );
        Err(StartupError::RetriesExhausted {
            port: addr.port(),
            attempts: max_retries,
        })
    }

    fn fail_fatal(&mut self, attempt: u32, source: FatalBind, history: &[AttemptRecord]) -> StartupError {
        metrics::record_startup_attempt(AttemptOutcome::OsError);
        self.transition(SupervisorState::Failed, attempt);
        tracing::error!(
            attempt,
            attempts = history.len(),
            error = %source,
            "Fatal bind error, not retrying"
        );
        StartupError::Configuration { attempt, source }
    }

    fn transition(&mut self, next: SupervisorState, attempt: u32) {
        tracing::debug!(
            from = self.state.as_str(),
            to = next.as_str(),
            attempt,
            "Supervisor state change"
        );
        self.state = next;
    }
}

/// Run startup and report failure to the process boundary exactly once.
///
/// Returns the bound listener, or `None` after `exit` has been told the status.
pub async fn start_or_exit<P, R, B, S, E>(
    supervisor: &mut ListenerSupervisor<P, R, B, S>,
    exit: &E,
) -> Option<Arc<B::Handle>>
where
    P: PortProbe,
    R: PortReclaimer<B::Handle>,
    B: ListenerBinder,
    S: Sleeper,
    E: ProcessExit,
{
    match supervisor.start().await {
        Ok(handle) => Some(handle),
        Err(e) => {
            let code = e.exit_code();
            tracing::error!(error = %e, exit_code = code, "Startup failed");
            exit.exit(code);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_and_non_zero() {
        let exhausted = StartupError::RetriesExhausted { port: 3024, attempts: 3 };
        let config = StartupError::Configuration {
            attempt: 1,
            source: FatalBind::Bind(BindError::AddrInUse("127.0.0.1:3024".parse().unwrap())),
        };
        assert_eq!(exhausted.exit_code(), EXIT_RETRIES_EXHAUSTED);
        assert_eq!(config.exit_code(), EXIT_CONFIGURATION);
        assert_ne!(exhausted.exit_code(), 0);
        assert_eq!(exhausted.to_string(), "port 3024 still in use after 3 attempts");
    }

    #[test]
    fn slot_take_leaves_it_empty() {
        let slot = ListenerSlot::new();
        slot.store(Arc::new(7u8));
        assert_eq!(slot.current().as_deref(), Some(&7));
        assert_eq!(slot.take().as_deref(), Some(&7));
        assert!(slot.current().is_none());
    }

    #[test]
    fn settings_follow_config() {
        let mut config = ServerConfig::default();
        config.listener.port = 8443;
        config.startup.retry_delay_ms = 250;
        let settings = SupervisorSettings::from_config(&config);
        assert_eq!(settings.addr.port(), 8443);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.delay_after(1), Duration::from_millis(250));
        assert_eq!(settings.delay_after(2), Duration::from_millis(250));
    }
}
