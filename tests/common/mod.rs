#![allow(dead_code)]

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use recon_sweep::error::ProbeError;
use recon_sweep::resolver::NameResolver;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// Resolver backed by a fixed name table.
#[derive(Default)]
pub struct StaticResolver {
    table: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn with(mut self, host: &str, ip: &str) -> Self {
        let ip: IpAddr = ip.parse().expect("valid ip");
        self.table.entry(host.to_string()).or_default().push(ip);
        self
    }
}

#[async_trait]
impl NameResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError> {
        self.table
            .get(host)
            .cloned()
            .ok_or_else(|| ProbeError::NotFound(host.to_string()))
    }
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    port
}

/// Listener that accepts forever and greets each client with `greeting`.
pub async fn greeting_server(greeting: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = sock.write_all(greeting).await;
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            });
        }
    });
    port
}

/// Listener that accepts connections and never sends anything.
pub async fn silent_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((sock, _)) = listener.accept().await {
            held.push(sock);
        }
    });
    port
}
