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

//! The tunnel handle returned to callers.
//!
//! A [`Tunnel`] owns its local listener (through the accept loop task) and
//! nothing else. Stopping it closes the listener and removes the Unix socket
//! file if there is one; it neither waits for in-flight connections nor
//! closes the SSH session the tunnel was built on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::forwarding::endpoint::{EndpointKind, RemoteEndpoint};

/// Direction of one copy task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LocalToRemote,
    RemoteToLocal,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::LocalToRemote => write!(f, "local→remote"),
            Direction::RemoteToLocal => write!(f, "remote→local"),
        }
    }
}

/// Live counters of one tunnel, shared with its accept loop and relays
#[derive(Debug, Default)]
pub struct TunnelStats {
    connections_accepted: AtomicU64,
    active_connections: AtomicUsize,
    failed_dials: AtomicU64,
    bytes_local_to_remote: AtomicU64,
    bytes_remote_to_local: AtomicU64,
}

impl TunnelStats {
    pub(crate) fn record_accept(&self) -> u64 {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_failed_dial(&self) {
        self.failed_dials.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn add_bytes(&self, direction: Direction, n: u64) {
        let counter = match direction {
            Direction::LocalToRemote => &self.bytes_local_to_remote,
            Direction::RemoteToLocal => &self.bytes_remote_to_local,
        };
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TunnelStatsSnapshot {
        TunnelStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            failed_dials: self.failed_dials.load(Ordering::Relaxed),
            bytes_local_to_remote: self.bytes_local_to_remote.load(Ordering::Relaxed),
            bytes_remote_to_local: self.bytes_remote_to_local.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`TunnelStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunnelStatsSnapshot {
    /// Local connections accepted so far
    pub connections_accepted: u64,
    /// Proxied connections still relaying
    pub active_connections: usize,
    /// Accepted connections dropped because the remote dial failed
    pub failed_dials: u64,
    pub bytes_local_to_remote: u64,
    pub bytes_remote_to_local: u64,
}

impl TunnelStatsSnapshot {
    pub fn total_bytes(&self) -> u64 {
        self.bytes_local_to_remote + self.bytes_remote_to_local
    }
}

/// A running local forwarder
pub struct Tunnel {
    local_endpoint: String,
    local_kind: EndpointKind,
    remote: RemoteEndpoint,
    socket_path: Option<PathBuf>,
    cancel: CancellationToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
    socket_removed: AtomicBool,
    stats: Arc<TunnelStats>,
}

impl Tunnel {
    pub(crate) fn new(
        local_endpoint: String,
        local_kind: EndpointKind,
        remote: RemoteEndpoint,
        socket_path: Option<PathBuf>,
        cancel: CancellationToken,
        accept_task: JoinHandle<()>,
        stats: Arc<TunnelStats>,
    ) -> Self {
        Self {
            local_endpoint,
            local_kind,
            remote,
            socket_path,
            cancel,
            accept_task: Mutex::new(Some(accept_task)),
            stopped: AtomicBool::new(false),
            socket_removed: AtomicBool::new(false),
            stats,
        }
    }

    /// Endpoint the downstream client should connect to, e.g.
    /// `tcp:127.0.0.1:40123` or `unix:/tmp/ovsdb-tunnel-42.sock`
    pub fn local_endpoint(&self) -> &str {
        &self.local_endpoint
    }

    pub fn local_kind(&self) -> EndpointKind {
        self.local_kind
    }

    /// The remote endpoint every accepted connection is dialed to
    pub fn remote(&self) -> &RemoteEndpoint {
        &self.remote
    }

    /// Path of the Unix socket file, for Unix listeners
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_path.as_deref()
    }

    pub fn stats(&self) -> TunnelStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Close the listener and remove the Unix socket file, once.
    ///
    /// Later calls return immediately. Proxied connections already running
    /// are left to finish on their own.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            trace!("Tunnel {} already stopped", self.local_endpoint);
            return;
        }

        debug!("Stopping tunnel {}", self.local_endpoint);
        self.cancel.cancel();

        let task = self
            .accept_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Accept loop for {} ended abnormally: {}", self.local_endpoint, e);
            }
        }

        self.release_socket_file();
        info!("Tunnel {} stopped", self.local_endpoint);
    }

    /// Remove the Unix socket file at most once, whoever gets there first
    fn release_socket_file(&self) {
        if self.socket_removed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(path) = &self.socket_path {
            remove_socket_file(path);
        }
    }
}

impl fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tunnel")
            .field("local_endpoint", &self.local_endpoint)
            .field("remote", &self.remote)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        self.release_socket_file();
    }
}

fn remove_socket_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => trace!("Removed socket file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove socket file {:?}: {}", path, e),
    }
}
