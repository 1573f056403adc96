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

//! Error types for tunnel establishment.
//!
//! Everything that prevents a usable [`Tunnel`](crate::tunnel::Tunnel) from
//! existing is reported synchronously through [`TunnelError`]. Failures that
//! happen after a tunnel is running stay local to one proxied connection and
//! are only logged.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::ssh::tokio_client;

/// Errors returned by the establish path of the tunnel manager
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The private key file could not be read
    #[error("failed to read private key {}: {source}", path.display())]
    KeyLoad {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The private key file was read but is not a recognized unencrypted key
    #[error("failed to parse private key {}: {source}", path.display())]
    KeyParse {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A hop of the SSH chain could not be dialed, handshaken or authenticated
    ///
    /// `index` is 1-based over the whole chain: jump hosts first, the final
    /// target last.
    #[error("failed to establish SSH hop {index} ({hop}): {source}")]
    Establish {
        index: usize,
        hop: String,
        #[source]
        source: tokio_client::Error,
    },

    /// The remote endpoint does not start with `tcp:` or `unix:`
    #[error("unsupported endpoint type: {0}")]
    UnsupportedEndpoint(String),

    /// The local listener could not be bound
    #[error("failed to listen on local {kind} endpoint {address}: {source}")]
    Listen {
        kind: &'static str,
        address: String,
        #[source]
        source: io::Error,
    },
}

impl TunnelError {
    /// The 1-based hop index for [`TunnelError::Establish`], `None` otherwise
    pub fn failed_hop(&self) -> Option<usize> {
        match self {
            TunnelError::Establish { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_establish_error_mentions_hop() {
        let err = TunnelError::Establish {
            index: 2,
            hop: "bob@bastion2:2200".to_string(),
            source: tokio_client::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "refused",
            )),
        };

        let message = err.to_string();
        assert!(message.contains("hop 2"));
        assert!(message.contains("bob@bastion2:2200"));
        assert_eq!(err.failed_hop(), Some(2));
    }

    #[test]
    fn test_unsupported_endpoint_names_input() {
        let err = TunnelError::UnsupportedEndpoint("ssl:10.0.0.1:6640".to_string());
        assert_eq!(err.to_string(), "unsupported endpoint type: ssl:10.0.0.1:6640");
        assert_eq!(err.failed_hop(), None);
    }
}
