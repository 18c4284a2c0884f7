//! Shared, single-flight access to a connection
//!
//! The protocol is strictly half-duplex. Every request holds the connection
//! lock from the first byte sent to the last acknowledgement, so the session
//! and its run monitor can share one `Link` without tearing frames.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;

use vsp_core::VspResult;

use crate::Connection;

/// Cloneable handle to the session's one connection
#[derive(Clone)]
pub struct Link {
    inner: Arc<Mutex<Connection>>,
}

impl Link {
    pub fn new(conn: Connection) -> Self {
        Link {
            inner: Arc::new(Mutex::new(conn)),
        }
    }

    /// Request/response round trip
    pub async fn command(&self, cmd: &str) -> VspResult<Vec<String>> {
        self.inner.lock().await.command(cmd).await
    }

    /// Fire-and-forget frame
    pub async fn post(&self, payload: &str) -> VspResult<()> {
        self.inner.lock().await.post(payload).await
    }

    /// Out-of-band byte followed by the framed reply it provokes, as one
    /// exchange
    pub async fn signal_with_reply(&self, byte: u8) -> VspResult<Vec<String>> {
        let mut conn = self.inner.lock().await;
        conn.signal(byte).await?;
        conn.receive_fields().await
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.is_connected()
    }

    pub async fn peer(&self) -> String {
        self.inner.lock().await.peer()
    }

    /// Waits for any in-flight request before closing
    pub async fn disconnect(&self) {
        self.inner.lock().await.disconnect();
    }

    /// Both handles refer to the same connection
    pub fn same_as(&self, other: &Link) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}
