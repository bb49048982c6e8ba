//! Timeout helpers shared by the server write path and the client.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Default timeout for connecting and waiting on replies
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default limit for flushing one batch of frames to a client socket
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Await `future`, failing with [`ProtocolError::Timeout`] once `duration` elapses.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| ProtocolError::Timeout)
}
