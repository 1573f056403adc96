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

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use ovsdb_tunnel::{
    cli::Cli,
    config::Config,
    manager::TunnelManager,
    route::Router,
    ssh::tokio_client::RusshConnector,
    utils::init_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match cli.config_path() {
        Some(path) => Config::load(&path).await?,
        None => Config::default(),
    };
    cli.apply_overrides(&mut config);

    let endpoints = cli.endpoint_configs(&config)?;

    let connector = RusshConnector::with_verifier(config.host_key_verifier());
    let manager = TunnelManager::new(Arc::new(connector))
        .with_connect_timeout(config.connect_timeout());
    let router = Router::new(manager);

    let route = router.connect_first(endpoints).await?;
    println!("{}", route.endpoint());

    if !route.is_tunneled() {
        tracing::info!("No tunnel needed for {}", route.endpoint());
        return Ok(());
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Interrupted, shutting down tunnel");
    route.close().await;

    Ok(())
}
