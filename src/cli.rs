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

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;

use crate::config::{expand_tilde, Config};
use crate::forwarding::ForwarderKind;
use crate::profile::ConnectionProfile;
use crate::route::EndpointConfig;
use crate::ssh::known_hosts::StrictHostKeyChecking;

const DEFAULT_KEY_FILE: &str = "~/.ssh/id_ed25519";

#[derive(Parser, Debug)]
#[command(
    name = "ovsdb-tunnel",
    version,
    about = "Expose a remote OVSDB endpoint on a private local socket through a multi-hop SSH tunnel",
    after_help = "EXAMPLES:\n  Through two bastions:   ovsdb-tunnel -H db.internal -l admin -J alice@bastion1,bob@bastion2:2200 unix:/var/run/openvswitch/db.sock\n  Failover candidates:    ovsdb-tunnel -H db.internal tcp:10.0.0.1:6640 tcp:10.0.0.2:6640\n  From config file:       ovsdb-tunnel -F ./tunnels.yaml\n\nThe local endpoint is printed on stdout; the tunnel runs until Ctrl-C."
)]
pub struct Cli {
    #[arg(
        value_name = "ENDPOINT",
        help = "Remote endpoint(s) as tcp:host:port or unix:/path, tried in order\nWhen omitted, endpoints come from the configuration file"
    )]
    pub endpoints: Vec<String>,

    #[arg(
        short = 'H',
        long = "host",
        help = "SSH target host; without it endpoints are used directly"
    )]
    pub host: Option<String>,

    #[arg(short = 'p', long, default_value = "22", help = "SSH port of the target host")]
    pub port: u16,

    #[arg(
        short = 'l',
        long = "login",
        help = "SSH user for the target and for jump hosts without user@ [default: $USER]"
    )]
    pub user: Option<String>,

    #[arg(
        short = 'i',
        long,
        help = "Unencrypted private key file [default: ~/.ssh/id_ed25519]"
    )]
    pub identity: Option<PathBuf>,

    #[arg(
        short = 'J',
        long = "jump-host",
        value_delimiter = ',',
        help = "Comma-separated jump hosts in [user@]host[:port] format, dialed in order"
    )]
    pub jump_hosts: Vec<String>,

    #[arg(
        long,
        default_value = "auto",
        help = "Local listener kind: tcp, unix or auto (match the remote endpoint)"
    )]
    pub forwarder: ForwarderKind,

    #[arg(
        short = 'F',
        long = "config",
        help = "Configuration file [default: ~/.config/ovsdb-tunnel/config.yaml]"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        help = "Host key checking mode (yes/no/accept-new) [default: no, or the config file value]\n  yes        - Strict checking against known_hosts\n  no         - Accept all host keys\n  accept-new - Record unknown hosts, reject changed keys"
    )]
    pub strict_host_key_checking: Option<StrictHostKeyChecking>,

    #[arg(long, help = "known_hosts file [default: ~/.ssh/known_hosts]")]
    pub known_hosts: Option<PathBuf>,

    #[arg(
        long,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Per-hop SSH connect timeout in seconds [default: 10, or the config file value]"
    )]
    pub connect_timeout: Option<u64>,

    #[arg(
        short = 'v',
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}

impl Cli {
    /// Path of the configuration file to read
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Config::default_path)
    }

    /// Fold command line overrides into `config`
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(mode) = self.strict_host_key_checking {
            config.defaults.strict_host_key_checking = mode;
        }
        if let Some(known_hosts) = &self.known_hosts {
            config.defaults.known_hosts = Some(expand_tilde(known_hosts));
        }
        if let Some(timeout) = self.connect_timeout {
            config.defaults.connect_timeout = timeout;
        }
    }

    /// Endpoint candidates: from the command line when given, otherwise
    /// from the configuration file
    pub fn endpoint_configs(&self, config: &Config) -> Result<Vec<EndpointConfig>> {
        if self.endpoints.is_empty() {
            if self.host.is_some() {
                return Err(anyhow!("--host given without any ENDPOINT"));
            }
            return Ok(config.endpoints.clone());
        }

        let tunnel = match &self.host {
            Some(host) => Some(self.profile(host)?),
            None => None,
        };

        Ok(self
            .endpoints
            .iter()
            .map(|endpoint| EndpointConfig {
                endpoint: endpoint.clone(),
                tunnel: tunnel.clone(),
            })
            .collect())
    }

    fn profile(&self, host: &str) -> Result<ConnectionProfile> {
        let user = match &self.user {
            Some(user) => user.clone(),
            None => std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .map_err(|_| anyhow!("no SSH user given; pass -l/--login"))?,
        };
        let key_file = self
            .identity
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_FILE));

        Ok(ConnectionProfile::new(host, user, expand_tilde(&key_file))
            .with_port(self.port)
            .with_jump_hosts(self.jump_hosts.iter().cloned())
            .with_forwarder(self.forwarder))
    }
}
