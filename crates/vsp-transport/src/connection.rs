//! TCP connection to a simulator

use bytes::Bytes;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info};

use vsp_core::{VspError, VspResult};

use crate::{Address, PacketChannel, TransportConfig};

/// Text reported by [`Connection::peer`] while closed
pub const NOT_CONNECTED: &str = "not connected";

/// One TCP connection; every operation except connecting needs it open
#[derive(Debug)]
pub struct Connection {
    config: TransportConfig,
    peer: Option<Address>,
    channel: Option<PacketChannel<TcpStream>>,
}

impl Connection {
    /// Create a closed connection
    pub fn new(config: TransportConfig) -> Self {
        Connection {
            config,
            peer: None,
            channel: None,
        }
    }

    /// Parse `address` and connect to it
    pub async fn open(address: &str, config: TransportConfig) -> VspResult<Self> {
        let mut conn = Connection::new(config);
        conn.connect(&Address::parse(address)?).await?;
        Ok(conn)
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// `host:port` of the peer, or `not connected`
    pub fn peer(&self) -> String {
        match &self.peer {
            Some(addr) if self.is_connected() => addr.to_string(),
            _ => NOT_CONNECTED.to_string(),
        }
    }

    /// Connect to the first resolved candidate that accepts, closing any
    /// previous connection first
    pub async fn connect(&mut self, address: &Address) -> VspResult<()> {
        if self.is_connected() {
            self.disconnect();
        }

        let connect_error = |reason: String| VspError::Connect {
            host: address.host.clone(),
            port: address.port,
            reason,
        };

        let candidates: Vec<_> = timeout(
            self.config.connect_timeout,
            lookup_host((address.host.as_str(), address.port)),
        )
        .await
        .map_err(|_| connect_error("address resolution timed out".into()))?
        .map_err(|e| connect_error(e.to_string()))?
        .collect();

        let mut last_error = String::from("no candidate addresses");
        for candidate in candidates {
            match timeout(self.config.connect_timeout, TcpStream::connect(candidate)).await {
                Ok(Ok(stream)) => {
                    stream
                        .set_nodelay(true)
                        .map_err(|e| connect_error(e.to_string()))?;
                    info!(%address, %candidate, "connected");
                    self.channel = Some(PacketChannel::new(stream, self.config.clone()));
                    self.peer = Some(address.clone());
                    return Ok(());
                }
                Ok(Err(e)) => {
                    debug!(%candidate, error = %e, "candidate refused");
                    last_error = e.to_string();
                }
                Err(_) => {
                    debug!(%candidate, "candidate timed out");
                    last_error = "connect timed out".into();
                }
            }
        }

        Err(connect_error(last_error))
    }

    /// Close the stream; harmless when already closed
    pub fn disconnect(&mut self) {
        if self.channel.take().is_some() {
            info!(peer = ?self.peer, "disconnected");
        }
        self.peer = None;
    }

    fn channel(&mut self) -> VspResult<&mut PacketChannel<TcpStream>> {
        self.channel.as_mut().ok_or(VspError::NotConnected)
    }

    /// A closed stream cannot be recovered; drop it so later calls fail fast
    fn settle<T>(&mut self, result: VspResult<T>) -> VspResult<T> {
        if let Err(VspError::NotConnected) = &result {
            self.disconnect();
        }
        result
    }

    pub async fn send(&mut self, payload: &str) -> VspResult<()> {
        let result = self.channel()?.send(payload).await;
        self.settle(result)
    }

    pub async fn post(&mut self, payload: &str) -> VspResult<()> {
        let result = self.channel()?.post(payload).await;
        self.settle(result)
    }

    pub async fn signal(&mut self, byte: u8) -> VspResult<()> {
        let result = self.channel()?.signal(byte).await;
        self.settle(result)
    }

    pub async fn receive(&mut self) -> VspResult<Bytes> {
        let result = self.channel()?.receive().await;
        self.settle(result)
    }

    pub async fn receive_fields(&mut self) -> VspResult<Vec<String>> {
        let result = self.channel()?.receive_fields().await;
        self.settle(result)
    }

    pub async fn command(&mut self, cmd: &str) -> VspResult<Vec<String>> {
        let result = self.channel()?.command(cmd).await;
        self.settle(result)
    }
}

impl Default for Connection {
    fn default() -> Self {
        Connection::new(TransportConfig::default())
    }
}
