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

use tracing_subscriber::EnvFilter;

pub fn create_env_filter(verbosity: u8) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        // RUST_LOG wins, e.g. to debug russh internals
        EnvFilter::from_default_env()
    } else {
        verbosity_filter(verbosity)
    }
}

fn verbosity_filter(verbosity: u8) -> EnvFilter {
    match verbosity {
        0 => EnvFilter::new("ovsdb_tunnel=warn"),
        1 => EnvFilter::new("ovsdb_tunnel=info"),
        // -vv: SSH troubleshooting
        2 => EnvFilter::new("ovsdb_tunnel=debug,russh=debug"),
        _ => EnvFilter::new("ovsdb_tunnel=trace,russh=trace"),
    }
}

/// Install the fmt subscriber on stderr; stdout carries the local endpoint
pub fn init_logging(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(create_env_filter(verbosity))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
