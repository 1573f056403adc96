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

//! Public key authentication over an established SSH handshake.

use russh::client::{Handle, Handler};
use russh::keys::PrivateKeyWithHashAlg;

use super::Error;
use crate::ssh::key::SigningKey;

/// Authenticate `username` on `handle` with `key`.
///
/// RSA keys are signed with the strongest hash the server advertises.
pub async fn authenticate<H: Handler>(
    handle: &mut Handle<H>,
    username: &str,
    key: &SigningKey,
) -> Result<(), Error> {
    let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
    let result = handle
        .authenticate_publickey(
            username,
            PrivateKeyWithHashAlg::new(key.private_key(), hash_alg),
        )
        .await?;

    if !result.success() {
        return Err(Error::KeyAuthFailed(username.to_string()));
    }
    Ok(())
}
