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

//! Connection profile: everything needed to reach one SSH target.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::forwarding::ForwarderKind;
use crate::jump::parser::DEFAULT_SSH_PORT;

/// Target host, credentials and hop chain for one tunnel attempt
///
/// An empty `host` means no tunnel is wanted; that decision belongs to the
/// caller (see [`crate::route::Router`]), the dialer never sees such a profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default)]
    pub host: String,
    /// SSH port of the target; 0 means 22
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub key_file: PathBuf,
    /// Jump host descriptors in dial order
    #[serde(default)]
    pub jump_hosts: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_forwarder")]
    pub forwarder: ForwarderKind,
}

impl ConnectionProfile {
    pub fn new(host: impl Into<String>, user: impl Into<String>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            user: user.into(),
            key_file: key_file.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_jump_hosts<S: Into<String>>(mut self, jump_hosts: impl IntoIterator<Item = S>) -> Self {
        self.jump_hosts = jump_hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_forwarder(mut self, forwarder: ForwarderKind) -> Self {
        self.forwarder = forwarder;
        self
    }

    /// Whether this profile asks for a tunnel at all
    pub fn wants_tunnel(&self) -> bool {
        !self.host.trim().is_empty()
    }

    /// Get the effective port (provided or default SSH port)
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_SSH_PORT
        } else {
            self.port
        }
    }

    /// Trim text fields, default the port and drop blank jump hosts
    pub fn normalized(mut self) -> Self {
        self.host = self.host.trim().to_string();
        self.user = self.user.trim().to_string();
        let key_file = self.key_file.to_string_lossy().trim().to_string();
        self.key_file = PathBuf::from(key_file);
        self.port = self.effective_port();
        self.jump_hosts = self
            .jump_hosts
            .into_iter()
            .map(|j| j.trim().to_string())
            .filter(|j| !j.is_empty())
            .collect();
        self
    }
}

fn deserialize_forwarder<'de, D>(deserializer: D) -> Result<ForwarderKind, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    value
        .as_deref()
        .unwrap_or("")
        .parse()
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_port() {
        let profile = ConnectionProfile::new("db.internal", "admin", "/tmp/key");
        assert_eq!(profile.effective_port(), 22);
        assert_eq!(profile.clone().with_port(0).effective_port(), 22);
        assert_eq!(profile.with_port(2200).effective_port(), 2200);
    }

    #[test]
    fn test_wants_tunnel() {
        assert!(!ConnectionProfile::default().wants_tunnel());
        assert!(!ConnectionProfile::new("  ", "u", "k").wants_tunnel());
        assert!(ConnectionProfile::new("db", "u", "k").wants_tunnel());
    }

    #[test]
    fn test_normalized() {
        let profile = ConnectionProfile {
            host: " db.internal ".to_string(),
            port: 0,
            user: " admin".to_string(),
            key_file: PathBuf::from(" /home/admin/.ssh/id_ed25519 "),
            jump_hosts: vec![" alice@b1 ".to_string(), "".to_string(), "   ".to_string()],
            forwarder: ForwarderKind::Auto,
        }
        .normalized();

        assert_eq!(profile.host, "db.internal");
        assert_eq!(profile.port, 22);
        assert_eq!(profile.user, "admin");
        assert_eq!(profile.key_file, PathBuf::from("/home/admin/.ssh/id_ed25519"));
        assert_eq!(profile.jump_hosts, vec!["alice@b1".to_string()]);
    }

    #[test]
    fn test_deserialize_forwarder_variants() {
        let yaml = "host: db\nforwarder: unix\n";
        let profile: ConnectionProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.forwarder, ForwarderKind::Unix);

        let yaml = "host: db\nforwarder: ''\n";
        let profile: ConnectionProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.forwarder, ForwarderKind::Auto);

        let yaml = "host: db\n";
        let profile: ConnectionProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.forwarder, ForwarderKind::Auto);
        assert_eq!(profile.port, 0);

        let yaml = "host: db\nforwarder: udp\n";
        assert!(serde_yaml::from_str::<ConnectionProfile>(yaml).is_err());
    }
}
