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

//! The SSH session abstraction the tunnel drives.
//!
//! A session is an authenticated SSH connection that can open byte streams
//! to addresses reachable from its far side. Sessions are shared by
//! reference ([`SharedSession`]) between the dialer, the accept loop and
//! every proxied connection; implementations must allow concurrent dials
//! from many tasks without external locking.

use std::fmt;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::tokio_client::Error;
use crate::forwarding::endpoint::{split_host_port, EndpointKind, RemoteEndpoint};

/// A bidirectional byte stream: a local socket or an SSH channel
pub trait TunnelStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> TunnelStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxedStream = Box<dyn TunnelStream>;

/// An authenticated SSH connection able to dial through its remote side
#[async_trait]
pub trait SshSession: Send + Sync + fmt::Debug {
    /// Open a stream to `host:port` as seen from the remote side
    async fn dial_tcp(&self, host: &str, port: u16) -> Result<BoxedStream, Error>;

    /// Open a stream to a Unix-domain socket on the remote side
    async fn dial_unix(&self, path: &str) -> Result<BoxedStream, Error>;

    /// Close the session; dials after this fail
    async fn close(&self) -> Result<(), Error>;

    fn is_closed(&self) -> bool;

    /// Dial a classified remote endpoint with the matching primitive
    async fn dial_endpoint(&self, endpoint: &RemoteEndpoint) -> Result<BoxedStream, Error> {
        match endpoint.kind {
            EndpointKind::Tcp => {
                let (host, port) = split_host_port(&endpoint.address)
                    .ok_or_else(|| Error::AddressInvalid(endpoint.address.clone()))?;
                self.dial_tcp(&host, port).await
            }
            EndpointKind::Unix => self.dial_unix(&endpoint.address).await,
        }
    }
}

pub type SharedSession = std::sync::Arc<dyn SshSession>;

/// Close every session in `sessions`, last opened first.
///
/// Errors are logged; closing is best effort.
pub async fn close_in_reverse(sessions: &[SharedSession]) {
    for session in sessions.iter().rev() {
        if let Err(e) = session.close().await {
            warn!("Failed to close SSH session {:?}: {}", session, e);
        }
    }
}

/// The session at the end of a hop chain, keeping every earlier hop alive.
///
/// Each hop's transport is a channel of the previous hop, so the whole
/// stack must live as long as the final session. Dials go to the last hop;
/// closing tears the stack down from the last hop back to the first.
pub struct ChainedSession {
    hops: Vec<SharedSession>,
}

impl ChainedSession {
    /// `hops` must be in dial order and non-empty
    pub fn new(hops: Vec<SharedSession>) -> Self {
        assert!(!hops.is_empty(), "a session chain needs at least one hop");
        Self { hops }
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    fn target(&self) -> &SharedSession {
        // new() guarantees at least one hop
        &self.hops[self.hops.len() - 1]
    }
}

impl fmt::Debug for ChainedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedSession")
            .field("hops", &self.hops)
            .finish()
    }
}

#[async_trait]
impl SshSession for ChainedSession {
    async fn dial_tcp(&self, host: &str, port: u16) -> Result<BoxedStream, Error> {
        self.target().dial_tcp(host, port).await
    }

    async fn dial_unix(&self, path: &str) -> Result<BoxedStream, Error> {
        self.target().dial_unix(path).await
    }

    async fn close(&self) -> Result<(), Error> {
        debug!("Closing SSH chain of {} hop(s)", self.hops.len());
        close_in_reverse(&self.hops).await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.target().is_closed()
    }
}
