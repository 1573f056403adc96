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

//! Host key verification strategies.
//!
//! The default is [`ServerCheckMethod::NoCheck`], which accepts any host key
//! on every hop. That keeps behavioral parity with the OVSDB viewer this
//! tunnel was built for, and it means a man-in-the-middle on any hop can
//! impersonate that hop. Deployments that care should pass
//! `--strict-host-key-checking yes` or supply their own [`HostKeyVerifier`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::BaseDirs;
use russh::keys::PublicKey;

use super::tokio_client::Error;

/// Decides whether a server's host key is acceptable for `host:port`
pub trait HostKeyVerifier: Send + Sync + fmt::Debug {
    fn verify(&self, host: &str, port: u16, key: &PublicKey) -> Result<bool, Error>;
}

/// Built-in host key verification methods
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ServerCheckMethod {
    /// Accept any host key
    #[default]
    NoCheck,
    /// Verify against a specific base64 encoded public key
    PublicKey(String),
    /// Verify against a public key file
    PublicKeyFile(PathBuf),
    /// Use the default known_hosts file (~/.ssh/known_hosts)
    DefaultKnownHostsFile,
    /// Use a specific known_hosts file path
    KnownHostsFile(PathBuf),
    /// Trust on first use: record unknown hosts, reject changed keys
    AcceptNewKnownHostsFile(PathBuf),
}

impl HostKeyVerifier for ServerCheckMethod {
    fn verify(&self, host: &str, port: u16, key: &PublicKey) -> Result<bool, Error> {
        let rejected = || Error::ServerCheckFailed(format!("{host}:{port}"));
        match self {
            ServerCheckMethod::NoCheck => Ok(true),
            ServerCheckMethod::PublicKey(encoded) => {
                let expected =
                    russh::keys::parse_public_key_base64(encoded).map_err(|_| rejected())?;
                Ok(expected == *key)
            }
            ServerCheckMethod::PublicKeyFile(path) => {
                let expected = russh::keys::load_public_key(path).map_err(|_| rejected())?;
                Ok(expected == *key)
            }
            ServerCheckMethod::DefaultKnownHostsFile => {
                russh::keys::check_known_hosts(host, port, key).map_err(|_| rejected())
            }
            ServerCheckMethod::KnownHostsFile(path) => {
                russh::keys::check_known_hosts_path(host, port, key, path).map_err(|_| rejected())
            }
            ServerCheckMethod::AcceptNewKnownHostsFile(path) => {
                match russh::keys::check_known_hosts_path(host, port, key, path) {
                    Ok(true) => Ok(true),
                    Ok(false) => {
                        learn_host_key(host, port, key, path);
                        Ok(true)
                    }
                    Err(russh::keys::Error::KeyChanged { line }) => {
                        tracing::warn!(
                            "Host key for {}:{} changed (known_hosts line {})",
                            host,
                            port,
                            line
                        );
                        Err(rejected())
                    }
                    Err(_) => Err(rejected()),
                }
            }
        }
    }
}

/// Append a newly seen host key; failing to record it does not block the connection
fn learn_host_key(host: &str, port: u16, key: &PublicKey, path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create {:?}: {}", parent, e);
        }
    }
    match russh::keys::known_hosts::learn_known_hosts_path(host, port, key, path) {
        Ok(()) => tracing::info!("Added host key for {}:{} to {:?}", host, port, path),
        Err(e) => tracing::warn!("Failed to record host key for {}:{}: {}", host, port, e),
    }
}

/// Get the default known_hosts file path
pub fn get_default_known_hosts_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(".ssh").join("known_hosts"))
}

/// Mode for host key checking, as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrictHostKeyChecking {
    /// Verify against known_hosts, fail on unknown or changed keys
    Yes,
    /// Accept all host keys
    #[default]
    No,
    /// Record unknown hosts in known_hosts, fail on changed keys
    AcceptNew,
}

impl FromStr for StrictHostKeyChecking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" | "true" => Ok(Self::Yes),
            "no" | "false" | "" => Ok(Self::No),
            "accept-new" | "tofu" => Ok(Self::AcceptNew),
            other => Err(format!(
                "invalid host key checking mode '{other}' (expected yes, no or accept-new)"
            )),
        }
    }
}

/// Create a ServerCheckMethod based on strict host key checking mode
///
/// `known_hosts` overrides the default `~/.ssh/known_hosts` location.
pub fn get_check_method(
    strict_mode: StrictHostKeyChecking,
    known_hosts: Option<PathBuf>,
) -> ServerCheckMethod {
    let path = known_hosts.or_else(get_default_known_hosts_path);
    match strict_mode {
        StrictHostKeyChecking::No => {
            tracing::debug!("Host key checking disabled (strict mode = no)");
            ServerCheckMethod::NoCheck
        }
        StrictHostKeyChecking::Yes => match path {
            Some(path) => {
                tracing::debug!("Using known_hosts file: {:?} (strict mode)", path);
                ServerCheckMethod::KnownHostsFile(path)
            }
            None => {
                tracing::warn!("Could not determine known_hosts path, using default lookup");
                ServerCheckMethod::DefaultKnownHostsFile
            }
        },
        StrictHostKeyChecking::AcceptNew => match path {
            Some(path) => {
                tracing::debug!("Using known_hosts file: {:?} (accept-new mode)", path);
                ServerCheckMethod::AcceptNewKnownHostsFile(path)
            }
            None => {
                tracing::warn!("Could not determine known_hosts path, accepting host keys");
                ServerCheckMethod::NoCheck
            }
        },
    }
}
