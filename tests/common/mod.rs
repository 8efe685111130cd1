//! Scripted collaborators for driving the startup and shutdown state machines.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use track_server::lifecycle::{ListenerSupervisor, ProcessExit, SupervisorSettings};
use track_server::net::{
    BindError, ListenerBinder, ListenerHandle, PortProbe, PortReclaimer, ProbeError, TlsError,
};
use track_server::resilience::{BackoffPolicy, Sleeper};

/// Something a fake observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Reclaim { owned: bool },
    Probe,
    Bind,
    Sleep(Duration),
}

/// Shared, ordered log of fake activity.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Journal {
    pub fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| wanted(e)).count()
    }

    pub fn reclaims(&self) -> usize {
        self.count(|e| matches!(e, Event::Reclaim { .. }))
    }

    pub fn probes(&self) -> usize {
        self.count(|e| matches!(e, Event::Probe))
    }

    pub fn binds(&self) -> usize {
        self.count(|e| matches!(e, Event::Bind))
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Sleep(d) => Some(d),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ProbeStep {
    Free,
    Busy,
    Fail(io::ErrorKind),
}

#[derive(Debug, Clone, Copy)]
pub enum BindStep {
    Ok,
    Busy,
    Fatal,
}

#[derive(Debug, Clone, Copy)]
pub enum CloseBehavior {
    Immediate,
    Delay(Duration),
    Hang,
}

/// Probe answering from a script; answers `Free` once the script runs out.
pub struct ScriptedProbe {
    steps: Mutex<VecDeque<ProbeStep>>,
    journal: Journal,
}

impl ScriptedProbe {
    pub fn new(steps: &[ProbeStep], journal: Journal) -> Self {
        Self {
            steps: Mutex::new(steps.iter().copied().collect()),
            journal,
        }
    }
}

impl PortProbe for ScriptedProbe {
    async fn is_port_free(&self, addr: SocketAddr) -> Result<bool, ProbeError> {
        self.journal.push(Event::Probe);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(ProbeStep::Free);
        match step {
            ProbeStep::Free => Ok(true),
            ProbeStep::Busy => Ok(false),
            ProbeStep::Fail(kind) => Err(ProbeError {
                addr,
                source: io::Error::from(kind),
            }),
        }
    }
}

/// Reclaimer that closes owned handles and records every call.
pub struct RecordingReclaimer {
    journal: Journal,
}

impl RecordingReclaimer {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl<H: ListenerHandle> PortReclaimer<H> for RecordingReclaimer {
    async fn reclaim(&self, _addr: SocketAddr, owned: Option<Arc<H>>) {
        self.journal.push(Event::Reclaim {
            owned: owned.is_some(),
        });
        if let Some(handle) = owned {
            handle.close().await;
        }
    }
}

/// Binder answering from a script; binds successfully once the script runs out.
pub struct ScriptedBinder {
    steps: Mutex<VecDeque<BindStep>>,
    close: CloseBehavior,
    journal: Journal,
}

impl ScriptedBinder {
    pub fn new(steps: &[BindStep], close: CloseBehavior, journal: Journal) -> Self {
        Self {
            steps: Mutex::new(steps.iter().copied().collect()),
            close,
            journal,
        }
    }
}

impl ListenerBinder for ScriptedBinder {
    type Handle = FakeListener;

    async fn bind(&self, addr: SocketAddr) -> Result<FakeListener, BindError> {
        self.journal.push(Event::Bind);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(BindStep::Ok);
        match step {
            BindStep::Ok => Ok(FakeListener::new(addr, self.close)),
            BindStep::Busy => Err(BindError::AddrInUse(addr)),
            BindStep::Fatal => Err(BindError::Tls(TlsError::NoCertificates)),
        }
    }
}

/// Listener handle that counts close calls.
#[derive(Debug)]
pub struct FakeListener {
    addr: SocketAddr,
    open: AtomicBool,
    close_calls: AtomicUsize,
    close: CloseBehavior,
}

impl FakeListener {
    pub fn new(addr: SocketAddr, close: CloseBehavior) -> Self {
        Self {
            addr,
            open: AtomicBool::new(true),
            close_calls: AtomicUsize::new(0),
            close,
        }
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl ListenerHandle for FakeListener {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        match self.close {
            CloseBehavior::Immediate => {}
            CloseBehavior::Delay(d) => tokio::time::sleep(d).await,
            CloseBehavior::Hang => std::future::pending::<()>().await,
        }
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Sleeper that records the requested delay and returns at once.
pub struct RecordingSleeper {
    journal: Journal,
}

impl RecordingSleeper {
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.journal.push(Event::Sleep(duration));
    }
}

/// Process exit that records codes instead of exiting.
#[derive(Debug, Default)]
pub struct RecordingExit {
    codes: Mutex<Vec<i32>>,
}

impl RecordingExit {
    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().unwrap().clone()
    }
}

impl ProcessExit for RecordingExit {
    fn exit(&self, code: i32) {
        self.codes.lock().unwrap().push(code);
    }
}

pub type FakeSupervisor =
    ListenerSupervisor<ScriptedProbe, RecordingReclaimer, ScriptedBinder, RecordingSleeper>;

pub fn settings(max_retries: u32, retry_delay: Duration) -> SupervisorSettings {
    SupervisorSettings {
        addr: "127.0.0.1:3024".parse().unwrap(),
        max_retries,
        retry_delay,
        max_delay: Duration::from_secs(10),
        backoff: BackoffPolicy::Fixed,
    }
}

/// Supervisor wired to scripted fakes sharing one journal.
pub fn fake_supervisor(
    max_retries: u32,
    probe: &[ProbeStep],
    bind: &[BindStep],
    close: CloseBehavior,
) -> (FakeSupervisor, Journal) {
    let journal = Journal::default();
    let supervisor = ListenerSupervisor::new(
        settings(max_retries, Duration::ZERO),
        ScriptedProbe::new(probe, journal.clone()),
        RecordingReclaimer::new(journal.clone()),
        ScriptedBinder::new(bind, close, journal.clone()),
        RecordingSleeper::new(journal.clone()),
    );
    (supervisor, journal)
}

/// An address on 127.0.0.1 that was free a moment ago.
pub fn free_addr() -> SocketAddr {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}
