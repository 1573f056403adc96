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

//! SSH jump host (ProxyJump) chains
//!
//! Reaches a target host through zero or more intermediate SSH servers,
//! the way OpenSSH's `-J user1@jump1:port1,user2@jump2:port2` does.
//!
//! # Features
//! * Permissive `[user@]host[:port]` descriptor parsing
//! * Hops dialed strictly in order, each through the previous session
//! * Per-hop timeout; a failing hop aborts the chain and closes what was opened

pub mod chain;
pub mod parser;

pub use chain::{ChainedDialer, HopTarget, SshConnector};
pub use parser::{parse_jump_host, parse_jump_hosts, JumpHost};
