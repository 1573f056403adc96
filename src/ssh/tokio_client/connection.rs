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

//! russh-backed SSH sessions.
//!
//! [`RusshConnector`] turns a raw byte stream into an authenticated
//! [`RusshSession`]. The stream is either a plain TCP socket (first hop) or a
//! `direct-tcpip` channel of the previous hop, so the same handshake code
//! serves every position in the chain.

use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{Config, Handle, Handler};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::authentication::authenticate;
use super::Error;
use crate::jump::chain::{HopTarget, SshConnector};
use crate::ssh::key::SigningKey;
use crate::ssh::known_hosts::{HostKeyVerifier, ServerCheckMethod};
use crate::ssh::session::{BoxedStream, SharedSession, SshSession};

/// Originator reported in `direct-tcpip` channel requests
const ORIGINATOR_ADDRESS: &str = "127.0.0.1";

/// SSH client handler for managing server key verification.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    hostname: String,
    port: u16,
    verifier: Arc<dyn HostKeyVerifier>,
}

impl ClientHandler {
    /// Create a new client handler.
    pub fn new(hostname: String, port: u16, verifier: Arc<dyn HostKeyVerifier>) -> Self {
        Self {
            hostname,
            port,
            verifier,
        }
    }
}

impl Handler for ClientHandler {
    type Error = Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        let accepted = self
            .verifier
            .verify(&self.hostname, self.port, server_public_key)?;
        if !accepted {
            return Err(Error::ServerCheckFailed(format!(
                "{}:{}",
                self.hostname, self.port
            )));
        }
        Ok(true)
    }
}

/// An authenticated russh client connection for one hop
pub struct RusshSession {
    handle: Handle<ClientHandler>,
    hop: String,
}

impl RusshSession {
    pub fn new(handle: Handle<ClientHandler>, hop: String) -> Self {
        Self { handle, hop }
    }
}

impl Debug for RusshSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RusshSession")
            .field("hop", &self.hop)
            .field("connection_handle", &"Handle<ClientHandler>")
            .finish()
    }
}

#[async_trait]
impl SshSession for RusshSession {
    async fn dial_tcp(&self, host: &str, port: u16) -> Result<BoxedStream, Error> {
        trace!("Opening direct-tcpip channel to {}:{} via {}", host, port, self.hop);
        let channel = self
            .handle
            .channel_open_direct_tcpip(host, u32::from(port), ORIGINATOR_ADDRESS, 0)
            .await?;
        Ok(Box::new(channel.into_stream()))
    }

    async fn dial_unix(&self, path: &str) -> Result<BoxedStream, Error> {
        trace!("Opening direct-streamlocal channel to {} via {}", path, self.hop);
        let channel = self.handle.channel_open_direct_streamlocal(path).await?;
        Ok(Box::new(channel.into_stream()))
    }

    async fn close(&self) -> Result<(), Error> {
        if self.handle.is_closed() {
            return Ok(());
        }
        debug!("Disconnecting SSH session to {}", self.hop);
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
            .map_err(Error::SshError)
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

/// Production [`SshConnector`]: TCP for the first hop, russh for handshakes
#[derive(Debug, Clone)]
pub struct RusshConnector {
    config: Arc<Config>,
    verifier: Arc<dyn HostKeyVerifier>,
}

impl RusshConnector {
    /// A connector that accepts any host key (see [`crate::ssh::known_hosts`])
    pub fn new() -> Self {
        Self::with_verifier(Arc::new(ServerCheckMethod::NoCheck))
    }

    pub fn with_verifier(verifier: Arc<dyn HostKeyVerifier>) -> Self {
        Self {
            config: Arc::new(Config::default()),
            verifier,
        }
    }

    /// Same as `with_verifier`, but with a non default [`russh::client::Config`].
    pub fn with_config(config: Config, verifier: Arc<dyn HostKeyVerifier>) -> Self {
        Self {
            config: Arc::new(config),
            verifier,
        }
    }
}

impl Default for RusshConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SshConnector for RusshConnector {
    async fn dial_direct(&self, host: &str, port: u16) -> Result<BoxedStream, Error> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    async fn handshake(
        &self,
        stream: BoxedStream,
        hop: &HopTarget,
        key: &SigningKey,
    ) -> Result<SharedSession, Error> {
        let handler = ClientHandler::new(hop.host.clone(), hop.port, Arc::clone(&self.verifier));
        let mut handle =
            russh::client::connect_stream(Arc::clone(&self.config), stream, handler).await?;

        authenticate(&mut handle, &hop.user, key).await?;

        Ok(Arc::new(RusshSession::new(handle, hop.to_string())))
    }
}
