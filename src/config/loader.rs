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

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tokio::fs;

use super::types::Config;
use super::utils::expand_tilde;
use crate::jump::chain::DEFAULT_CONNECT_TIMEOUT;
use crate::ssh::known_hosts::{get_check_method, HostKeyVerifier};

impl Config {
    /// Load configuration from a file.
    ///
    /// A missing file is not an error and yields the default config. Key
    /// file and known_hosts paths have `~` expanded.
    pub async fn load(path: &Path) -> Result<Self> {
        let expanded_path = expand_tilde(path);

        if !expanded_path.exists() {
            tracing::debug!(
                "Config file not found at {:?}, using defaults",
                expanded_path
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&expanded_path).await.with_context(|| {
            format!(
                "Failed to read configuration file at {}",
                expanded_path.display()
            )
        })?;

        let config = Self::from_yaml(&content).with_context(|| {
            format!(
                "Failed to parse YAML configuration file at {}",
                expanded_path.display()
            )
        })?;

        tracing::debug!(
            "Loaded {} endpoint(s) from {:?}",
            config.endpoints.len(),
            expanded_path
        );
        Ok(config)
    }

    /// Parse a YAML document and expand `~` in its paths
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(content)?;
        config.expand_paths();
        Ok(config)
    }

    fn expand_paths(&mut self) {
        if let Some(known_hosts) = &self.defaults.known_hosts {
            self.defaults.known_hosts = Some(expand_tilde(known_hosts));
        }
        for endpoint in &mut self.endpoints {
            if let Some(tunnel) = &mut endpoint.tunnel {
                tunnel.key_file = expand_tilde(&tunnel.key_file);
            }
        }
    }

    /// Default config location, e.g. `~/.config/ovsdb-tunnel/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ovsdb-tunnel").map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Per-hop timeout; `0` in the file falls back to the default
    pub fn connect_timeout(&self) -> Duration {
        match self.defaults.connect_timeout {
            0 => DEFAULT_CONNECT_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }

    /// Host key verifier for the configured checking mode
    pub fn host_key_verifier(&self) -> Arc<dyn HostKeyVerifier> {
        Arc::new(get_check_method(
            self.defaults.strict_host_key_checking,
            self.defaults.known_hosts.clone(),
        ))
    }
}
