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

//! Local forwarding (TCP and Unix-domain listeners)
//!
//! Both listener variants feed one accept loop:
//!
//! 1. Accept a local connection
//! 2. Dial the remote endpoint through the SSH session, using the dial
//!    primitive of the *remote* endpoint kind
//! 3. On success, hand both streams to a [`ProxiedConnection`]; on failure,
//!    drop the local connection and keep accepting
//!
//! The loop ends when the tunnel is stopped or `accept` fails.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::endpoint::{format_endpoint, EndpointKind, RemoteEndpoint};
use super::splice::ProxiedConnection;
use crate::error::TunnelError;
use crate::ssh::session::{BoxedStream, SharedSession};
use crate::tunnel::{Tunnel, TunnelStats};

/// Prefix of generated Unix socket file names
const SOCKET_FILE_PREFIX: &str = "ovsdb-tunnel";

/// A bound local listener of either kind
#[derive(Debug)]
enum LocalListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(tokio::net::UnixListener),
}

impl LocalListener {
    async fn bind_tcp() -> Result<(Self, String), TunnelError> {
        let bind_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        let listen_error = |source: io::Error| TunnelError::Listen {
            kind: EndpointKind::Tcp.as_str(),
            address: bind_addr.to_string(),
            source,
        };

        let listener = TcpListener::bind(bind_addr).await.map_err(listen_error)?;
        let local_addr = listener.local_addr().map_err(listen_error)?;
        Ok((LocalListener::Tcp(listener), local_addr.to_string()))
    }

    #[cfg(unix)]
    fn bind_unix(path: &Path) -> Result<(Self, String), TunnelError> {
        let listener =
            tokio::net::UnixListener::bind(path).map_err(|source| TunnelError::Listen {
                kind: EndpointKind::Unix.as_str(),
                address: path.display().to_string(),
                source,
            })?;
        Ok((LocalListener::Unix(listener), path.display().to_string()))
    }

    #[cfg(not(unix))]
    fn bind_unix(path: &Path) -> Result<(Self, String), TunnelError> {
        Err(TunnelError::Listen {
            kind: EndpointKind::Unix.as_str(),
            address: path.display().to_string(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "Unix-domain sockets are not supported on this platform",
            ),
        })
    }

    async fn accept(&self) -> io::Result<(BoxedStream, String)> {
        match self {
            LocalListener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                stream.set_nodelay(true)?;
                Ok((Box::new(stream), peer.to_string()))
            }
            #[cfg(unix)]
            LocalListener::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok((Box::new(stream), "unix peer".to_string()))
            }
        }
    }
}

/// Fresh socket path in `dir`: `ovsdb-tunnel-<random>.sock`
pub fn generate_socket_path(dir: &Path) -> PathBuf {
    dir.join(format!("{}-{}.sock", SOCKET_FILE_PREFIX, fastrand::u64(..)))
}

/// Bind a local listener of `local_kind` and start forwarding every
/// accepted connection to `remote` through `session`.
///
/// Unix listeners are created inside `socket_dir`. The session is shared
/// with the accept loop but not owned by the returned [`Tunnel`]; closing it
/// stays with the caller.
pub async fn open_forwarder(
    session: SharedSession,
    remote: RemoteEndpoint,
    local_kind: EndpointKind,
    socket_dir: &Path,
) -> Result<Tunnel, TunnelError> {
    let (listener, address, socket_path) = match local_kind {
        EndpointKind::Tcp => {
            let (listener, address) = LocalListener::bind_tcp().await?;
            (listener, address, None)
        }
        EndpointKind::Unix => {
            let path = generate_socket_path(socket_dir);
            let (listener, address) = LocalListener::bind_unix(&path)?;
            (listener, address, Some(path))
        }
    };

    let local_endpoint = format_endpoint(local_kind, &address);
    info!("Forwarding {} -> {}", local_endpoint, remote);

    let cancel = CancellationToken::new();
    let stats = Arc::new(TunnelStats::default());
    let accept_task = tokio::spawn(accept_loop(
        listener,
        session,
        remote.clone(),
        cancel.clone(),
        Arc::clone(&stats),
    ));

    Ok(Tunnel::new(
        local_endpoint,
        local_kind,
        remote,
        socket_path,
        cancel,
        accept_task,
        stats,
    ))
}

async fn accept_loop(
    listener: LocalListener,
    session: SharedSession,
    remote: RemoteEndpoint,
    cancel: CancellationToken,
    stats: Arc<TunnelStats>,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Accept loop for {} cancelled", remote);
                break;
            }
            result = listener.accept() => result,
        };

        let (local, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept local connection for {}: {}", remote, e);
                break;
            }
        };

        let id = stats.record_accept();
        trace!("Accepted connection #{} from {}", id, peer);

        let dialed = tokio::select! {
            _ = cancel.cancelled() => break,
            result = session.dial_endpoint(&remote) => result,
        };

        match dialed {
            Ok(remote_stream) => {
                debug!("Connection #{} from {} relayed to {}", id, peer, remote);
                ProxiedConnection::new(id, peer, Arc::clone(&stats)).spawn(local, remote_stream);
            }
            Err(e) => {
                warn!("Failed to dial {} for connection #{}: {}", remote, id, e);
                stats.record_failed_dial();
                drop(local);
            }
        }
    }

    trace!("Accept loop for {} exited", remote);
}
