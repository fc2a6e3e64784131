/// Monitoring engine module - probes databases on a fixed cadence
///
/// This module is responsible for:
/// - Opening sessions and running timeout-bounded liveness checks
/// - Limiting how many checks run at once
/// - Fanning a cycle out to every enabled database and collecting results
/// - Firing cycles on a schedule without overlap
pub mod alert;
pub mod checker;
pub mod cycle;
pub mod executor;
pub mod scheduler;
pub mod types;
pub mod worker_pool;

pub use alert::{AlertHook, LogAlertHook};
pub use checker::{Connector, TcpConnector};
pub use cycle::CycleRunner;
pub use executor::HealthProbe;
pub use scheduler::MonitoringScheduler;
pub use worker_pool::WorkerPool;
