// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bidirectional relay between an accepted local connection and the stream
//! dialed through the SSH session.
//!
//! Each direction is its own task. When either one reaches EOF or fails it
//! shuts down its write side and signals the other direction to stop, so
//! both sockets are released together and no half-open pair is left behind.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::tunnel::{Direction, TunnelStats};

/// Read buffer size for one copy direction
const COPY_BUFFER_SIZE: usize = 8192;

/// A local connection joined to its remote counterpart
///
/// Transient: it lives only as long as data flows on one accepted
/// connection and is not tracked by the tunnel that spawned it.
#[derive(Debug)]
pub struct ProxiedConnection {
    id: u64,
    peer: String,
    stats: Arc<TunnelStats>,
}

impl ProxiedConnection {
    pub fn new(id: u64, peer: impl Into<String>, stats: Arc<TunnelStats>) -> Self {
        Self {
            id,
            peer: peer.into(),
            stats,
        }
    }

    /// Start relaying between `local` and `remote` in both directions
    ///
    /// The returned handle resolves once both directions are done and both
    /// streams have been dropped.
    pub fn spawn<L, R>(self, local: L, remote: R) -> JoinHandle<()>
    where
        L: AsyncRead + AsyncWrite + Send + 'static,
        R: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.stats.connection_opened();

        tokio::spawn(async move {
            let done = CancellationToken::new();
            let (local_rd, local_wr) = tokio::io::split(local);
            let (remote_rd, remote_wr) = tokio::io::split(remote);

            let upstream = tokio::spawn(copy_direction(
                local_rd,
                remote_wr,
                done.clone(),
                Direction::LocalToRemote,
                Arc::clone(&self.stats),
            ));
            let downstream = tokio::spawn(copy_direction(
                remote_rd,
                local_wr,
                done.clone(),
                Direction::RemoteToLocal,
                Arc::clone(&self.stats),
            ));

            let (sent, received) = tokio::join!(upstream, downstream);
            self.stats.connection_closed();

            debug!(
                "Connection #{} from {} closed: {} bytes sent, {} bytes received",
                self.id,
                self.peer,
                sent.unwrap_or_default(),
                received.unwrap_or_default()
            );
        })
    }
}

/// Copy one direction until EOF, error or the peer direction finishing
async fn copy_direction<R, W>(
    mut reader: R,
    mut writer: W,
    done: CancellationToken,
    direction: Direction,
    stats: Arc<TunnelStats>,
) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = tokio::select! {
            _ = done.cancelled() => break,
            result = reader.read(&mut buffer) => match result {
                Ok(0) => {
                    trace!("{}: EOF", direction);
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    trace!("{}: read error: {}", direction, e);
                    break;
                }
            },
        };

        let written = tokio::select! {
            _ = done.cancelled() => break,
            result = writer.write_all(&buffer[..n]) => result,
        };
        if let Err(e) = written {
            trace!("{}: write error: {}", direction, e);
            break;
        }

        total += n as u64;
        stats.add_bytes(direction, n as u64);
    }

    if let Err(e) = writer.shutdown().await {
        trace!("{}: shutdown: {}", direction, e);
    }
    done.cancel();
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_relays_both_directions() {
        let stats = Arc::new(TunnelStats::default());
        let (local, mut client) = duplex(64);
        let (remote, mut server) = duplex(64);

        let handle = ProxiedConnection::new(1, "test", Arc::clone(&stats)).spawn(local, remote);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(client);
        handle.await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.bytes_local_to_remote, 4);
        assert_eq!(snapshot.bytes_remote_to_local, 4);
        assert_eq!(snapshot.active_connections, 0);
    }

    #[tokio::test]
    async fn test_one_side_closing_closes_the_other() {
        let stats = Arc::new(TunnelStats::default());
        let (local, client) = duplex(64);
        let (remote, mut server) = duplex(64);

        let handle = ProxiedConnection::new(2, "test", stats).spawn(local, remote);

        // Local client goes away; the remote side must observe EOF even
        // though it never wrote anything.
        drop(client);
        let mut buf = Vec::new();
        let n = server.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);

        handle.await.unwrap();
    }
}
