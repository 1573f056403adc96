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

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by a single SSH hop or by a dial through an SSH session
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("SSH protocol error: {0}")]
    SshError(#[from] russh::Error),

    #[error("invalid address {0:?}")]
    AddressInvalid(String),

    #[error("host key for {0} was rejected by the host key verifier")]
    ServerCheckFailed(String),

    #[error("public key authentication rejected for user {0:?}")]
    KeyAuthFailed(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("session is closed")]
    SessionClosed,
}
