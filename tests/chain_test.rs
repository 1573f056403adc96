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

//! Chained SSH dialer behavior against a recording connector.

mod common;

use std::time::Duration;

use common::{profile, HopBehavior, RecordingConnector};
use ovsdb_tunnel::jump::ChainedDialer;
use ovsdb_tunnel::ssh::SshSession;
use ovsdb_tunnel::ssh::tokio_client::Error;
use ovsdb_tunnel::TunnelError;

#[tokio::test]
async fn test_two_bastions_then_target_in_order() {
    let connector = RecordingConnector::new();
    let dialer = ChainedDialer::new(connector.clone());

    let target = profile("db.internal", &["alice@bastion1:22", "bob@bastion2:2200"]).with_port(6640);
    let session = dialer.dial(&target).await.unwrap();

    assert_eq!(
        connector.log.events(),
        vec![
            "direct bastion1:22",
            "handshake alice@bastion1:22",
            "dial bastion2:2200 via bastion1",
            "handshake bob@bastion2:2200",
            "dial db.internal:6640 via bastion2",
            "handshake admin@db.internal:6640",
        ]
    );
    assert!(!session.is_closed());
    assert_eq!(connector.log.count_prefix("close"), 0);
}

#[tokio::test]
async fn test_no_jump_hosts_dials_target_directly() {
    let connector = RecordingConnector::new();
    let dialer = ChainedDialer::new(connector.clone());

    dialer.dial(&profile("db.internal", &[])).await.unwrap();

    assert_eq!(
        connector.log.events(),
        vec!["direct db.internal:22", "handshake admin@db.internal:22"]
    );
}

#[tokio::test]
async fn test_success_leaks_no_sessions_and_closes_in_reverse() {
    for jump_count in 0..=3 {
        let connector = RecordingConnector::new();
        let dialer = ChainedDialer::new(connector.clone());

        let jumps: Vec<String> = (1..=jump_count).map(|i| format!("jump{i}")).collect();
        let jump_refs: Vec<&str> = jumps.iter().map(String::as_str).collect();
        let session = dialer.dial(&profile("target", &jump_refs)).await.unwrap();

        assert_eq!(connector.log.count_prefix("handshake"), jump_count + 1);
        assert_eq!(connector.log.count_prefix("close"), 0);

        session.close().await.unwrap();

        let mut expected: Vec<String> = jumps.iter().map(|j| format!("close {j}")).collect();
        expected.push("close target".to_string());
        expected.reverse();
        let closes: Vec<String> = connector
            .log
            .events()
            .into_iter()
            .filter(|e| e.starts_with("close"))
            .collect();
        assert_eq!(closes, expected, "with {jump_count} jump host(s)");
    }
}

#[tokio::test]
async fn test_failure_at_hop_k_closes_earlier_hops() {
    let hosts = ["bastion1", "bastion2", "db.internal"];

    for (k, failing) in hosts.iter().enumerate() {
        let connector = RecordingConnector::new();
        connector.set_behavior(failing, HopBehavior::Fail);
        let dialer = ChainedDialer::new(connector.clone());

        let err = dialer
            .dial(&profile("db.internal", &["bastion1", "bastion2"]))
            .await
            .unwrap_err();

        let hop_index = k + 1;
        match &err {
            TunnelError::Establish { index, hop, source } => {
                assert_eq!(*index, hop_index);
                assert!(hop.contains(failing), "{hop} should name {failing}");
                assert!(matches!(source, Error::KeyAuthFailed(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.failed_hop(), Some(hop_index));

        // Every session opened before the failing hop is closed, latest first
        let expected: Vec<String> = hosts[..k]
            .iter()
            .rev()
            .map(|h| format!("close {h}"))
            .collect();
        let closes: Vec<String> = connector
            .log
            .events()
            .into_iter()
            .filter(|e| e.starts_with("close"))
            .collect();
        assert_eq!(closes, expected, "failure at hop {hop_index}");

        // Nothing is attempted after the failing hop
        assert_eq!(connector.log.count_prefix("handshake"), hop_index);
    }
}

#[tokio::test]
async fn test_hop_timeout_aborts_chain() {
    let connector = RecordingConnector::new();
    connector.set_behavior("bastion2", HopBehavior::Hang);
    let dialer = ChainedDialer::new(connector.clone()).with_connect_timeout(Duration::from_millis(100));

    let err = dialer
        .dial(&profile("db.internal", &["bastion1", "bastion2"]))
        .await
        .unwrap_err();

    match err {
        TunnelError::Establish { index, source, .. } => {
            assert_eq!(index, 2);
            assert!(matches!(source, Error::Timeout(d) if d == Duration::from_millis(100)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(connector.log.events().last().unwrap(), "close bastion1");
    assert_eq!(connector.log.count_prefix("handshake admin@db.internal"), 0);
}

#[tokio::test]
async fn test_unreadable_key_is_reported_before_network() {
    let connector = RecordingConnector::new();
    let dialer = ChainedDialer::new(connector.clone());

    let mut target = profile("db.internal", &["bastion1"]);
    target.key_file = "/nonexistent/ovsdb-tunnel/key".into();

    let err = dialer.dial(&target).await.unwrap_err();
    assert!(matches!(err, TunnelError::KeyLoad { .. }));
    assert!(connector.log.events().is_empty());
}
