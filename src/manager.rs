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

//! Tunnel manager: classify → dial → listen.
//!
//! A failed establish leaves nothing behind: the chain dialer closes its own
//! partial sessions, and a listener failure closes the freshly dialed
//! session before the error is returned.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::TunnelError;
use crate::forwarding::{
    classify_endpoint, open_forwarder, resolve_forwarder_kind, UNIX_SOCKETS_SUPPORTED,
};
use crate::jump::chain::{ChainedDialer, SshConnector};
use crate::profile::ConnectionProfile;
use crate::ssh::session::SharedSession;
use crate::ssh::tokio_client::RusshConnector;
use crate::tunnel::{Tunnel, TunnelStatsSnapshot};

/// Builds tunnels from connection profiles
#[derive(Debug, Clone)]
pub struct TunnelManager {
    dialer: ChainedDialer,
    unix_supported: bool,
    socket_dir: PathBuf,
}

impl TunnelManager {
    pub fn new(connector: Arc<dyn SshConnector>) -> Self {
        Self {
            dialer: ChainedDialer::new(connector),
            unix_supported: UNIX_SOCKETS_SUPPORTED,
            socket_dir: std::env::temp_dir(),
        }
    }

    /// Per-hop dial + handshake timeout (10 seconds unless overridden)
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.dialer = self.dialer.with_connect_timeout(connect_timeout);
        self
    }

    /// Override the Unix socket capability flag used to resolve `auto`
    pub fn with_unix_support(mut self, unix_supported: bool) -> Self {
        self.unix_supported = unix_supported;
        self
    }

    /// Directory for generated Unix socket files (the system temp dir by default)
    pub fn with_socket_dir(mut self, socket_dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = socket_dir.into();
        self
    }

    /// Establish a tunnel to `endpoint` using `profile`.
    ///
    /// The endpoint is classified first, so an unsupported endpoint fails
    /// without touching the network. The profile must ask for a tunnel
    /// (non-empty host); deciding that is the caller's job.
    pub async fn establish(
        &self,
        profile: &ConnectionProfile,
        endpoint: &str,
    ) -> Result<ManagedTunnel, TunnelError> {
        let remote = classify_endpoint(endpoint)?;
        let local_kind = resolve_forwarder_kind(profile.forwarder, remote.kind, self.unix_supported);
        debug!(
            "Endpoint {} resolved: remote {}, local {} (preference {})",
            endpoint, remote.kind, local_kind, profile.forwarder
        );

        let session = self.dialer.dial(profile).await?;

        let opened = open_forwarder(Arc::clone(&session), remote, local_kind, &self.socket_dir).await;
        match opened {
            Ok(tunnel) => {
                info!("Tunnel ready: {} -> {}", tunnel.local_endpoint(), endpoint);
                Ok(ManagedTunnel { tunnel, session })
            }
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!("Failed to close SSH session after listen error: {}", close_err);
                }
                Err(e)
            }
        }
    }
}

impl Default for TunnelManager {
    fn default() -> Self {
        Self::new(Arc::new(RusshConnector::new()))
    }
}

/// A tunnel together with the SSH session it owns
///
/// This is the 1:1 pairing current callers use. Stopping the tunnel leaves
/// the session open; [`ManagedTunnel::shutdown`] tears down both.
pub struct ManagedTunnel {
    tunnel: Tunnel,
    session: SharedSession,
}

impl ManagedTunnel {
    pub fn local_endpoint(&self) -> &str {
        self.tunnel.local_endpoint()
    }

    pub fn tunnel(&self) -> &Tunnel {
        &self.tunnel
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn stats(&self) -> TunnelStatsSnapshot {
        self.tunnel.stats()
    }

    /// Stop the tunnel only; idempotent
    pub async fn stop(&self) {
        self.tunnel.stop().await;
    }

    /// Stop the tunnel, then close the SSH session stack
    pub async fn shutdown(self) {
        self.tunnel.stop().await;
        if let Err(e) = self.session.close().await {
            warn!("Failed to close SSH session: {}", e);
        }
    }
}

impl fmt::Debug for ManagedTunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedTunnel")
            .field("tunnel", &self.tunnel)
            .field("session", &self.session)
            .finish()
    }
}
