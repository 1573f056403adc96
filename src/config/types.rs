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

//! Configuration type definitions.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::route::EndpointConfig;
use crate::ssh::known_hosts::StrictHostKeyChecking;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    /// Candidate endpoints, tried in order
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

/// Settings shared by every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// Per-hop dial and handshake timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    #[serde(
        default,
        deserialize_with = "deserialize_strict_mode",
        serialize_with = "serialize_strict_mode"
    )]
    pub strict_host_key_checking: StrictHostKeyChecking,

    /// known_hosts file, `~/.ssh/known_hosts` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            strict_host_key_checking: StrictHostKeyChecking::default(),
            known_hosts: None,
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn deserialize_strict_mode<'de, D>(deserializer: D) -> Result<StrictHostKeyChecking, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(StrictHostKeyChecking::default()),
        Some(Raw::Flag(true)) => Ok(StrictHostKeyChecking::Yes),
        Some(Raw::Flag(false)) => Ok(StrictHostKeyChecking::No),
        Some(Raw::Text(text)) => {
            StrictHostKeyChecking::from_str(&text).map_err(serde::de::Error::custom)
        }
    }
}

fn serialize_strict_mode<S>(mode: &StrictHostKeyChecking, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let text = match mode {
        StrictHostKeyChecking::Yes => "yes",
        StrictHostKeyChecking::No => "no",
        StrictHostKeyChecking::AcceptNew => "accept-new",
    };
    serializer.serialize_str(text)
}
