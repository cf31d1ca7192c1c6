//! Client used by the job-side tester sink.
//!
//! Each tuple is written as one envelope line. Tuples sent over one client
//! arrive at the listener in send order.

use std::net::SocketAddr;

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::debug;

use streamtap_core::envelope::encode_line;
use streamtap_core::{TesterId, Tuple};

use super::HostInfo;

#[derive(Debug, thiserror::Error)]
pub enum SinkClientError {
    #[error("Failed to connect to listener at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] streamtap_core::Error),

    #[error("Write to listener failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection from a tester sink to the relay's listener.
pub struct TesterSinkClient {
    writer: BufWriter<TcpStream>,
    peer: SocketAddr,
}

impl TesterSinkClient {
    pub async fn connect(host_info: &HostInfo) -> Result<Self, SinkClientError> {
        let stream = TcpStream::connect((host_info.host.as_str(), host_info.port))
            .await
            .map_err(|source| SinkClientError::Connect {
                addr: host_info.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        debug!(peer = %peer, "Tester sink connected");
        Ok(Self {
            writer: BufWriter::new(stream),
            peer,
        })
    }

    /// Queue one tuple for `tester_id`. Call [`flush`](Self::flush) to push
    /// buffered envelopes onto the wire.
    pub async fn send(&mut self, tester_id: TesterId, tuple: &Tuple) -> Result<(), SinkClientError> {
        let mut line = encode_line(tester_id, tuple)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Write a raw line, bypassing the encoder.
    pub async fn send_raw(&mut self, line: &str) -> Result<(), SinkClientError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), SinkClientError> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Flush and close the write half.
    pub async fn close(mut self) -> Result<(), SinkClientError> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        debug!(peer = %self.peer, "Tester sink closed");
        Ok(())
    }

    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
