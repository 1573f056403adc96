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

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::parser::parse_jump_hosts;
use crate::error::TunnelError;
use crate::profile::ConnectionProfile;
use crate::ssh::key::{load_signing_key, SigningKey};
use crate::ssh::session::{close_in_reverse, BoxedStream, ChainedSession, SharedSession};
use crate::ssh::tokio_client::Error;

/// Per-hop budget for dial + handshake + authentication
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Turns byte streams into authenticated SSH sessions
///
/// The dialer only ever opens the first hop's socket itself (through
/// [`SshConnector::dial_direct`]); every later hop rides inside the previous
/// session. Implementations must be usable from several tasks at once.
#[async_trait]
pub trait SshConnector: Send + Sync + fmt::Debug {
    /// Open a plain connection from the local process to `host:port`
    async fn dial_direct(&self, host: &str, port: u16) -> Result<BoxedStream, Error>;

    /// Run the SSH handshake and public key authentication over `stream`
    async fn handshake(
        &self,
        stream: BoxedStream,
        hop: &HopTarget,
        key: &SigningKey,
    ) -> Result<SharedSession, Error>;
}

/// One resolved hop: who to authenticate as, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopTarget {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl HopTarget {
    /// Resolve every hop of `profile` in dial order, final target last.
    ///
    /// Jump hosts without a `user@` part authenticate as the profile user.
    pub fn chain_for(profile: &ConnectionProfile) -> Vec<HopTarget> {
        let mut hops: Vec<HopTarget> = parse_jump_hosts(&profile.jump_hosts)
            .into_iter()
            .map(|jump| HopTarget {
                user: jump.effective_user(&profile.user).to_string(),
                host: jump.host,
                port: jump.port,
            })
            .collect();

        hops.push(HopTarget {
            user: profile.user.clone(),
            host: profile.host.clone(),
            port: profile.effective_port(),
        });
        hops
    }
}

impl fmt::Display for HopTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}@[{}]:{}", self.user, self.host, self.port)
        } else {
            write!(f, "{}@{}:{}", self.user, self.host, self.port)
        }
    }
}

/// Human readable `a -> b -> c` description of a hop list
pub fn path_description(hops: &[HopTarget]) -> String {
    hops.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Chained SSH dialer
///
/// Establishes one authenticated session to the profile's target by way of
/// its jump hosts, strictly in order. Either every hop succeeds and a single
/// [`ChainedSession`] owning the whole stack is returned, or every session
/// opened so far is closed before the error is returned.
#[derive(Debug, Clone)]
pub struct ChainedDialer {
    connector: Arc<dyn SshConnector>,
    connect_timeout: Duration,
}

impl ChainedDialer {
    pub fn new(connector: Arc<dyn SshConnector>) -> Self {
        Self {
            connector,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Load the profile's key, then dial its chain
    pub async fn dial(&self, profile: &ConnectionProfile) -> Result<SharedSession, TunnelError> {
        let key = load_signing_key(&profile.key_file)?;
        self.dial_with_key(profile, &key).await
    }

    /// Dial the chain with an already loaded key
    pub async fn dial_with_key(
        &self,
        profile: &ConnectionProfile,
        key: &SigningKey,
    ) -> Result<SharedSession, TunnelError> {
        let hops = HopTarget::chain_for(profile);
        info!("Establishing SSH chain: {}", path_description(&hops));

        let mut opened: Vec<SharedSession> = Vec::with_capacity(hops.len());
        for (i, hop) in hops.iter().enumerate() {
            let index = i + 1;
            debug!("Connecting hop {}/{}: {}", index, hops.len(), hop);

            let result = tokio::time::timeout(
                self.connect_timeout,
                self.connect_hop(opened.last(), hop, key),
            )
            .await
            .unwrap_or(Err(Error::Timeout(self.connect_timeout)));

            match result {
                Ok(session) => {
                    debug!("Hop {} authenticated: {}", index, hop);
                    opened.push(session);
                }
                Err(source) => {
                    warn!("SSH hop {} ({}) failed: {}", index, hop, source);
                    close_in_reverse(&opened).await;
                    return Err(TunnelError::Establish {
                        index,
                        hop: hop.to_string(),
                        source,
                    });
                }
            }
        }

        info!("SSH chain established ({} hop(s))", opened.len());
        Ok(Arc::new(ChainedSession::new(opened)))
    }

    async fn connect_hop(
        &self,
        previous: Option<&SharedSession>,
        hop: &HopTarget,
        key: &SigningKey,
    ) -> Result<SharedSession, Error> {
        let stream = match previous {
            None => self.connector.dial_direct(&hop.host, hop.port).await?,
            Some(session) => session.dial_tcp(&hop.host, hop.port).await?,
        };
        self.connector.handshake(stream, hop, key).await
    }
}
