use std::fmt;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use super::types::ProbeError;
use crate::config::DatabaseTarget;

/// Everything a driver needs to reach one database
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub username: String,
    pub password: String,
}

impl ConnectParams {
    /// Easy Connect style descriptor, `host:port/service`
    pub fn connect_string(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.service_name)
    }
}

impl From<&DatabaseTarget> for ConnectParams {
    fn from(target: &DatabaseTarget) -> Self {
        Self {
            host: target.host.clone(),
            port: target.port,
            service_name: target.service_name.clone(),
            username: target.username.clone(),
            password: target.password.clone(),
        }
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.connect_string())
    }
}

/// Driver seam: opens sessions against a database
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a session. Implementations should not block on the network here
    /// beyond what the driver requires to hand back a handle.
    async fn open(&self, params: &ConnectParams) -> Result<Box<dyn Session>, ProbeError>;
}

/// An open session against one database
#[async_trait::async_trait]
pub trait Session: Send {
    /// Lightweight liveness check. The caller bounds it with a timeout.
    async fn ping(&mut self) -> Result<(), ProbeError>;

    /// Release the session
    async fn close(self: Box<Self>);
}

/// Reachability connector over plain TCP.
///
/// `open` only validates the descriptor. `ping` connects to the listener, so
/// the measured latency is the TCP handshake to `host:port`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn open(&self, params: &ConnectParams) -> Result<Box<dyn Session>, ProbeError> {
        if params.host.trim().is_empty() {
            return Err(ProbeError::Open("host is empty".into()));
        }
        if params.port == 0 {
            return Err(ProbeError::Open("port 0 is not valid".into()));
        }
        if params.service_name.trim().is_empty() {
            return Err(ProbeError::Open(format!(
                "missing service name in descriptor {}",
                params.connect_string()
            )));
        }

        Ok(Box::new(TcpSession {
            host: params.host.clone(),
            port: params.port,
            stream: None,
        }))
    }
}

struct TcpSession {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

#[async_trait::async_trait]
impl Session for TcpSession {
    async fn ping(&mut self) -> Result<(), ProbeError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| ProbeError::Ping(format!("connect to {}:{} failed: {}", self.host, self.port, e)))?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(self: Box<Self>) {
        if let Some(mut stream) = self.stream {
            // Peer may already be gone
            let _ = stream.shutdown().await;
        }
    }
}
