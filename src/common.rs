use std::time::Duration;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::timeout,
};
use tracing::debug;

use crate::error::BenchError;

/// Number of keys written by the populator and addressed by the workload.
/// Both phases must agree on it, so it lives here.
pub const DEFAULT_KEY_SPACE: usize = 100_000;

/// Default cadence of the throughput sampler.
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(10);

/// Header row of the throughput results file.
pub const THROUGHPUT_HEADER: &str = "Time(ms),Throughput(MReqs/s)";

/// Options for the timeout of a connection.
#[derive(Debug, Clone)]
pub struct TimeoutOptions {
    /// Max time to wait for a full frame to arrive.
    pub read_timeout: Duration,
    /// Max time to wait for a frame to be written out.
    pub write_timeout: Duration,
    /// Server side: drop a connection with no request for this long.
    pub idle_timeout: Duration,
}

impl Default for TimeoutOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(10),
        }
    }
}

/// Largest frame body accepted from the wire.
pub const MAX_FRAME_LEN: u64 = 64 * 1024 * 1024;

/// Read exactly `len` bytes from `reader` within `read_timeout`.
pub async fn recv_len<R>(
    reader: &mut R,
    len: u64,
    read_timeout: Duration,
) -> Result<Vec<u8>, BenchError>
where
    R: AsyncRead + Unpin,
{
    if len > MAX_FRAME_LEN {
        return Err(BenchError::Protocol(format!(
            "Frame of {} bytes exceeds limit of {}",
            len, MAX_FRAME_LEN
        )));
    }
    let mut buffer = vec![0u8; len as usize];
    match timeout(read_timeout, reader.read_exact(&mut buffer)).await {
        Ok(Ok(_)) => {
            debug!("Received {} bytes", len);
            Ok(buffer)
        }
        Ok(Err(err)) => {
            debug!("Failed to receive data: {:?}", err);
            Err(err.into())
        }
        Err(_) => {
            debug!("Timeout to receive data");
            Err(BenchError::Timeout(format!("no data within {:?}", read_timeout)))
        }
    }
}

/// Write all of `data` to `writer` within `write_timeout`.
pub async fn send_data<W>(
    writer: &mut W,
    data: &[u8],
    write_timeout: Duration,
) -> Result<(), BenchError>
where
    W: AsyncWrite + Unpin,
{
    match timeout(write_timeout, writer.write_all(data)).await {
        Ok(Ok(_)) => {
            debug!("Sent {} bytes", data.len());
            Ok(())
        }
        Ok(Err(err)) => {
            debug!("Failed to send data: {:?}", err);
            Err(err.into())
        }
        Err(_) => {
            debug!("Timeout to send data");
            Err(BenchError::Timeout(format!(
                "write not finished within {:?}",
                write_timeout
            )))
        }
    }
}
