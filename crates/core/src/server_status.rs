//! Multiplayer server reachability
//!
//! The server address may be published as an SRV record
//! (`_minecraft._tcp.<host>`); the probe resolves it when present and then
//! attempts a plain TCP connection.

use crate::config::ServerSection;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

/// Resolved host and port of a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// SRV record name for a game server host
pub fn srv_name(host: &str) -> String {
    format!("_minecraft._tcp.{}", host)
}

/// Resolves SRV records
#[async_trait::async_trait]
pub trait SrvResolver: Send + Sync {
    /// First record for `name`; `None` when there is none or lookup fails
    async fn lookup(&self, name: &str) -> Option<ServerAddress>;
}

/// SRV resolver using the system DNS configuration
pub struct HickorySrvResolver {
    resolver: hickory_resolver::TokioAsyncResolver,
}

impl HickorySrvResolver {
    pub fn from_system_conf() -> std::io::Result<Self> {
        let resolver = hickory_resolver::TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(Self { resolver })
    }
}

impl std::fmt::Debug for HickorySrvResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickorySrvResolver").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl SrvResolver for HickorySrvResolver {
    async fn lookup(&self, name: &str) -> Option<ServerAddress> {
        let lookup = match self.resolver.srv_lookup(name).await {
            Ok(lookup) => lookup,
            Err(e) => {
                debug!("SRV lookup for {} failed: {}", name, e);
                return None;
            }
        };
        let record = lookup.iter().next()?;
        let target = record.target().to_utf8();
        Some(ServerAddress {
            host: target.trim_end_matches('.').to_string(),
            port: record.port(),
        })
    }
}

/// SRV resolver answering from a fixed table
#[derive(Debug, Default)]
pub struct StaticSrvResolver {
    records: Mutex<HashMap<String, ServerAddress>>,
}

impl StaticSrvResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, address: ServerAddress) {
        match self.records.lock() {
            Ok(mut records) => records.insert(name.into(), address),
            Err(poisoned) => poisoned.into_inner().insert(name.into(), address),
        };
    }
}

#[async_trait::async_trait]
impl SrvResolver for StaticSrvResolver {
    async fn lookup(&self, name: &str) -> Option<ServerAddress> {
        match self.records.lock() {
            Ok(records) => records.get(name).cloned(),
            Err(poisoned) => poisoned.into_inner().get(name).cloned(),
        }
    }
}

/// Checks whether the configured server accepts connections
pub struct ServerProbe<'a> {
    server: &'a ServerSection,
    resolver: &'a dyn SrvResolver,
    timeout: Duration,
}

impl<'a> ServerProbe<'a> {
    pub fn new(server: &'a ServerSection, resolver: &'a dyn SrvResolver, timeout: Duration) -> Self {
        Self {
            server,
            resolver,
            timeout,
        }
    }

    /// Address to connect to: the SRV target if published, else the
    /// configured host and port
    pub async fn resolve(&self) -> ServerAddress {
        match self.resolver.lookup(&srv_name(&self.server.host)).await {
            Some(address) => {
                debug!("Using SRV target {}", address);
                address
            }
            None => ServerAddress {
                host: self.server.host.clone(),
                port: self.server.port,
            },
        }
    }

    /// Whether a TCP connection can be opened within the timeout
    #[instrument(skip(self), fields(host = %self.server.host))]
    pub async fn is_reachable(&self) -> bool {
        let address = self.resolve().await;
        let connect = TcpStream::connect((address.host.as_str(), address.port));
        let reachable = match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Connection to {} failed: {}", address, e);
                false
            }
            Err(_) => {
                debug!("Connection to {} timed out", address);
                false
            }
        };
        info!(%address, reachable, "Server status");
        reachable
    }
}
