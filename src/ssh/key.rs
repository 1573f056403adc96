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

//! Private key loading for public-key authentication.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use russh::keys::PrivateKey;
use zeroize::Zeroizing;

use crate::error::TunnelError;

/// A parsed private key, shared by every hop of a chain
#[derive(Clone)]
pub struct SigningKey {
    key: Arc<PrivateKey>,
}

impl SigningKey {
    pub fn new(key: PrivateKey) -> Self {
        Self { key: Arc::new(key) }
    }

    /// Shared handle to the underlying private key
    pub fn private_key(&self) -> Arc<PrivateKey> {
        Arc::clone(&self.key)
    }

    /// OpenSSH algorithm name, e.g. `ssh-ed25519`
    pub fn algorithm(&self) -> String {
        self.key.algorithm().as_str().to_string()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

/// Read and parse an unencrypted private key file.
///
/// Read failures map to [`TunnelError::KeyLoad`], parse failures (including
/// passphrase-protected keys) to [`TunnelError::KeyParse`].
pub fn load_signing_key(path: &Path) -> Result<SigningKey, TunnelError> {
    let bytes = std::fs::read(path)
        .map(Zeroizing::new)
        .map_err(|source| TunnelError::KeyLoad {
            path: path.to_path_buf(),
            source,
        })?;

    let parse_error = |source: Box<dyn std::error::Error + Send + Sync>| TunnelError::KeyParse {
        path: path.to_path_buf(),
        source,
    };
    let contents = std::str::from_utf8(&bytes).map_err(|e| parse_error(e.into()))?;
    let key = russh::keys::decode_secret_key(contents, None).map_err(|e| parse_error(e.into()))?;

    tracing::debug!("Loaded {} private key from {:?}", key.algorithm().as_str(), path);
    Ok(SigningKey::new(key))
}
