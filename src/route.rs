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

//! Endpoint routing: direct or through a tunnel, with ordered failover.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::manager::{ManagedTunnel, TunnelManager};
use crate::profile::ConnectionProfile;

/// One candidate endpoint and how to reach it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// `tcp:host:port` or `unix:/path` as seen from the tunnel's far side
    pub endpoint: String,
    /// SSH tunnel to go through; absent or empty host means connect directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<ConnectionProfile>,
}

impl EndpointConfig {
    pub fn direct(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            tunnel: None,
        }
    }

    pub fn tunneled(endpoint: impl Into<String>, tunnel: ConnectionProfile) -> Self {
        Self {
            endpoint: endpoint.into(),
            tunnel: Some(tunnel),
        }
    }
}

/// Clean up user supplied endpoint configs.
///
/// Endpoint strings are trimmed and empty ones dropped. Tunnel profiles are
/// trimmed and defaulted (see [`ConnectionProfile::normalized`]); a profile
/// whose host ends up empty is removed, making that endpoint direct.
pub fn normalize_endpoints(endpoints: Vec<EndpointConfig>) -> Vec<EndpointConfig> {
    endpoints
        .into_iter()
        .filter_map(|config| {
            let endpoint = config.endpoint.trim().to_string();
            if endpoint.is_empty() {
                return None;
            }
            let tunnel = config
                .tunnel
                .map(ConnectionProfile::normalized)
                .filter(ConnectionProfile::wants_tunnel);
            Some(EndpointConfig { endpoint, tunnel })
        })
        .collect()
}

/// How the downstream client should connect
#[derive(Debug)]
pub enum Route {
    /// No tunnel requested: connect to the endpoint as given
    Direct { endpoint: String },
    /// Connect to the tunnel's local endpoint instead
    Tunneled(ManagedTunnel),
}

impl Route {
    /// The endpoint string to hand to the downstream client
    pub fn endpoint(&self) -> &str {
        match self {
            Route::Direct { endpoint } => endpoint,
            Route::Tunneled(tunnel) => tunnel.local_endpoint(),
        }
    }

    pub fn is_tunneled(&self) -> bool {
        matches!(self, Route::Tunneled(_))
    }

    /// Release the tunnel and its SSH session, if any
    pub async fn close(self) {
        if let Route::Tunneled(tunnel) = self {
            tunnel.shutdown().await;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    manager: TunnelManager,
}

impl Router {
    pub fn new(manager: TunnelManager) -> Self {
        Self { manager }
    }

    /// Route one endpoint; establish is only invoked when a tunnel host is set
    pub async fn route(&self, config: &EndpointConfig) -> Result<Route> {
        match &config.tunnel {
            Some(profile) if profile.wants_tunnel() => {
                let tunnel = self
                    .manager
                    .establish(profile, &config.endpoint)
                    .await
                    .with_context(|| {
                        format!("failed to tunnel to {} via {}", config.endpoint, profile.host)
                    })?;
                Ok(Route::Tunneled(tunnel))
            }
            _ => {
                debug!("No tunnel for {}, connecting directly", config.endpoint);
                Ok(Route::Direct {
                    endpoint: config.endpoint.clone(),
                })
            }
        }
    }

    /// Normalize `endpoints`, then return the first one that routes
    pub async fn connect_first(&self, endpoints: Vec<EndpointConfig>) -> Result<Route> {
        let endpoints = normalize_endpoints(endpoints);
        if endpoints.is_empty() {
            return Err(anyhow!("no endpoints provided"));
        }

        let mut last_error = None;
        for config in &endpoints {
            match self.route(config).await {
                Ok(route) => {
                    info!("Using {} for {}", route.endpoint(), config.endpoint);
                    return Ok(route);
                }
                Err(e) => {
                    warn!("Endpoint {} unavailable: {:#}", config.endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| anyhow!("no endpoint was attempted"));
        Err(last_error.context("failed to connect to any endpoint"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_normalize_trims_and_drops() {
        let endpoints = vec![
            EndpointConfig::direct("  tcp:10.0.0.1:6640 "),
            EndpointConfig::direct("   "),
            EndpointConfig::tunneled(
                "unix:/var/run/openvswitch/db.sock",
                ConnectionProfile {
                    host: " db.internal ".to_string(),
                    port: 0,
                    user: "admin ".to_string(),
                    key_file: PathBuf::from("~/.ssh/id_ed25519"),
                    jump_hosts: vec![" alice@bastion1 ".to_string(), " ".to_string()],
                    ..ConnectionProfile::default()
                },
            ),
            EndpointConfig::tunneled("tcp:10.0.0.2:6640", ConnectionProfile::default()),
        ];

        let normalized = normalize_endpoints(endpoints);
        assert_eq!(normalized.len(), 3);

        assert_eq!(normalized[0].endpoint, "tcp:10.0.0.1:6640");
        assert!(normalized[0].tunnel.is_none());

        let tunnel = normalized[1].tunnel.as_ref().unwrap();
        assert_eq!(tunnel.host, "db.internal");
        assert_eq!(tunnel.port, 22);
        assert_eq!(tunnel.user, "admin");
        assert_eq!(tunnel.jump_hosts, vec!["alice@bastion1".to_string()]);

        assert_eq!(normalized[2].endpoint, "tcp:10.0.0.2:6640");
        assert!(normalized[2].tunnel.is_none());
    }

    #[tokio::test]
    async fn test_direct_route_when_host_is_empty() {
        let router = Router::default();
        let config = EndpointConfig::tunneled("tcp:10.0.0.1:6640", ConnectionProfile::default());

        let route = router.route(&config).await.unwrap();
        assert!(!route.is_tunneled());
        assert_eq!(route.endpoint(), "tcp:10.0.0.1:6640");
        route.close().await;
    }

    #[tokio::test]
    async fn test_connect_first_requires_endpoints() {
        let router = Router::default();
        let err = router
            .connect_first(vec![EndpointConfig::direct("  ")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no endpoints provided");
    }
}
