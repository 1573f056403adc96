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

//! Jump host descriptor parsing.
//!
//! Parsing is deliberately permissive and never fails: anything that does not
//! look like `[user@]host[:port]` degrades to "whole remainder is the host,
//! port 22". Callers that need strict validation must validate upstream.

use std::fmt;

/// Port used when a descriptor omits it or gives an unusable one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A single jump host specification
///
/// Represents one hop in a jump host chain, parsed from
/// `user@host:port`, `host:port` or `host`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JumpHost {
    /// Username for SSH authentication (None when the descriptor has no `user@`)
    pub user: Option<String>,
    /// Hostname or IP address of the jump host
    pub host: String,
    /// SSH port, never zero
    pub port: u16,
}

impl JumpHost {
    /// Create a new jump host specification; a zero port becomes 22
    pub fn new(host: impl Into<String>, user: Option<String>, port: u16) -> Self {
        let port = if port == 0 { DEFAULT_SSH_PORT } else { port };
        Self {
            user,
            host: host.into(),
            port,
        }
    }

    /// The user from the descriptor, or `fallback` when it had none
    pub fn effective_user<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.user.as_deref().unwrap_or(fallback)
    }

    /// Convert to a connection string for display purposes
    pub fn to_connection_string(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match &self.user {
            Some(user) => format!("{}@{}:{}", user, host, self.port),
            None => format!("{}:{}", host, self.port),
        }
    }
}

impl fmt::Display for JumpHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Parse one jump host descriptor.
///
/// * The user is everything before the last `@` (absent when there is none
///   or it is empty).
/// * `host:port` splits on a single `:`; `[v6addr]:port` is also accepted.
/// * Port is 22 when absent, non-numeric or zero.
///
/// ```rust
/// use ovsdb_tunnel::jump::parse_jump_host;
///
/// let hop = parse_jump_host("alice@bastion1:2200");
/// assert_eq!(hop.user.as_deref(), Some("alice"));
/// assert_eq!(hop.host, "bastion1");
/// assert_eq!(hop.port, 2200);
///
/// let hop = parse_jump_host("bastion2");
/// assert_eq!(hop.user, None);
/// assert_eq!(hop.port, 22);
/// ```
pub fn parse_jump_host(spec: &str) -> JumpHost {
    let (user, host_port) = match spec.rsplit_once('@') {
        Some((user, rest)) => (Some(user).filter(|u| !u.is_empty()).map(str::to_string), rest),
        None => (None, spec),
    };

    let (host, port) = split_host_and_port(host_port);
    let port = port
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_SSH_PORT);

    JumpHost::new(host, user, port)
}

/// Parse a list of descriptors, dropping blank entries
pub fn parse_jump_hosts<S: AsRef<str>>(specs: &[S]) -> Vec<JumpHost> {
    specs
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .map(parse_jump_host)
        .collect()
}

fn split_host_and_port(host_port: &str) -> (&str, Option<&str>) {
    // [v6addr] or [v6addr]:port
    if let Some(rest) = host_port.strip_prefix('[') {
        if let Some((addr, tail)) = rest.split_once(']') {
            return (addr, tail.strip_prefix(':'));
        }
    }

    let mut parts = host_port.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(host), Some(port), None) => (host, Some(port)),
        _ => (host_port, None),
    }
}
