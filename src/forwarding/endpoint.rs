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

//! Transport-tagged endpoint strings: `tcp:host:port` and `unix:/path`.

use std::fmt;

use crate::error::TunnelError;

const TCP_PREFIX: &str = "tcp:";
const UNIX_PREFIX: &str = "unix:";

/// Transport kind of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Tcp,
    Unix,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Tcp => "tcp",
            EndpointKind::Unix => "unix",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            EndpointKind::Tcp => TCP_PREFIX,
            EndpointKind::Unix => UNIX_PREFIX,
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified endpoint: kind plus the address with its prefix stripped
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteEndpoint {
    pub kind: EndpointKind,
    pub address: String,
}

impl RemoteEndpoint {
    pub fn new(kind: EndpointKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
        }
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.address)
    }
}

/// Classify an endpoint string by its literal `tcp:` / `unix:` prefix.
///
/// The prefix match is exact and case sensitive; anything else is
/// [`TunnelError::UnsupportedEndpoint`].
pub fn classify_endpoint(endpoint: &str) -> Result<RemoteEndpoint, TunnelError> {
    if let Some(address) = endpoint.strip_prefix(TCP_PREFIX) {
        Ok(RemoteEndpoint::new(EndpointKind::Tcp, address))
    } else if let Some(address) = endpoint.strip_prefix(UNIX_PREFIX) {
        Ok(RemoteEndpoint::new(EndpointKind::Unix, address))
    } else {
        Err(TunnelError::UnsupportedEndpoint(endpoint.to_string()))
    }
}

/// Format a local address as an endpoint string of the given kind
pub fn format_endpoint(kind: EndpointKind, address: &str) -> String {
    format!("{}{}", kind.prefix(), address)
}

/// Split `host:port` or `[v6addr]:port` into its parts
///
/// Returns `None` when the port is missing or not a valid `u16`.
pub fn split_host_port(address: &str) -> Option<(String, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    Some((host.to_string(), port))
}
