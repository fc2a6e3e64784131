//! Test doubles shared by the unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::config::DatabaseTarget;
use crate::database::ResultSink;
use crate::monitoring::alert::AlertHook;
use crate::monitoring::checker::{ConnectParams, Connector, Session};
use crate::monitoring::types::{MonitorResult, ProbeError};

pub fn target(name: &str) -> DatabaseTarget {
    DatabaseTarget {
        name: name.to_string(),
        host: format!("{name}.db.internal"),
        port: 1521,
        service_name: "ORCL".to_string(),
        username: "monitor".to_string(),
        password: "secret".to_string(),
        enabled: true,
    }
}

#[derive(Debug, Clone)]
enum Behaviour {
    FailOpen(String),
    PingAfter(Duration),
    FailPing(Duration, String),
    PanicOnOpen,
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl Counters {
    fn enter(&self) {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Connector whose behaviour is scripted per host prefix (the target name).
/// Unknown targets answer after 10ms.
#[derive(Debug, Default)]
pub struct MockConnector {
    behaviours: HashMap<String, Behaviour>,
    counters: Arc<Counters>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_open(mut self, name: &str, message: &str) -> Self {
        self.behaviours.insert(name.into(), Behaviour::FailOpen(message.into()));
        self
    }

    pub fn ping_after(mut self, name: &str, delay: Duration) -> Self {
        self.behaviours.insert(name.into(), Behaviour::PingAfter(delay));
        self
    }

    pub fn fail_ping(mut self, name: &str, delay: Duration, message: &str) -> Self {
        self.behaviours.insert(name.into(), Behaviour::FailPing(delay, message.into()));
        self
    }

    pub fn panic_on_open(mut self, name: &str) -> Self {
        self.behaviours.insert(name.into(), Behaviour::PanicOnOpen);
        self
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.counters.running.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open sessions seen so far
    pub fn max_running(&self) -> usize {
        self.counters.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, params: &ConnectParams) -> Result<Box<dyn Session>, ProbeError> {
        let name = params.host.split('.').next().unwrap_or_default();
        let behaviour = self.behaviours.get(name).cloned().unwrap_or(Behaviour::PingAfter(Duration::from_millis(10)));

        match behaviour {
            Behaviour::FailOpen(message) => Err(ProbeError::Open(message)),
            Behaviour::PanicOnOpen => panic!("driver blew up for {name}"),
            Behaviour::PingAfter(delay) => {
                self.counters.opened.fetch_add(1, Ordering::SeqCst);
                self.counters.enter();
                Ok(Box::new(MockSession { delay, failure: None, counters: self.counters.clone() }))
            }
            Behaviour::FailPing(delay, message) => {
                self.counters.opened.fetch_add(1, Ordering::SeqCst);
                self.counters.enter();
                Ok(Box::new(MockSession { delay, failure: Some(message), counters: self.counters.clone() }))
            }
        }
    }
}

struct MockSession {
    delay: Duration,
    failure: Option<String>,
    counters: Arc<Counters>,
}

#[async_trait]
impl Session for MockSession {
    async fn ping(&mut self) -> Result<(), ProbeError> {
        tokio::time::sleep(self.delay).await;
        match &self.failure {
            Some(message) => Err(ProbeError::Ping(message.clone())),
            None => Ok(()),
        }
    }

    async fn close(self: Box<Self>) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        self.counters.leave();
    }
}

/// Sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    saved: Mutex<Vec<MonitorResult>>,
    cleanups: Mutex<Vec<u32>>,
    fail_saves: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail_saves: true, ..Self::default() }
    }

    pub fn saved(&self) -> Vec<MonitorResult> {
        self.saved.lock().unwrap().clone()
    }

    pub fn cleanups(&self) -> Vec<u32> {
        self.cleanups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn save_result(&self, result: &MonitorResult) -> Result<()> {
        self.saved.lock().unwrap().push(result.clone());
        if self.fail_saves {
            return Err(anyhow!("database is locked"));
        }
        Ok(())
    }

    async fn cleanup_old_data(&self, retention_days: u32) -> Result<u64> {
        self.cleanups.lock().unwrap().push(retention_days);
        Ok(0)
    }
}

/// Alert hook that counts failures
#[derive(Debug, Default)]
pub struct CountingAlertHook {
    pub failures: Mutex<Vec<String>>,
}

impl AlertHook for CountingAlertHook {
    fn on_failure(&self, result: &MonitorResult) {
        self.failures.lock().unwrap().push(result.target_name.clone());
    }
}
