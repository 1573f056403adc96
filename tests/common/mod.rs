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

//! Test doubles for the SSH seams.
//!
//! * [`RecordingConnector`] / [`RecordingSession`] log every dial, handshake
//!   and close so tests can assert ordering and cleanup.
//! * [`LoopbackConnector`] / [`LoopbackSession`] "tunnel" by dialing plain
//!   local sockets, which is enough to exercise real byte relaying.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ovsdb_tunnel::jump::{HopTarget, SshConnector};
use ovsdb_tunnel::ssh::session::{BoxedStream, SharedSession, SshSession};
use ovsdb_tunnel::ssh::tokio_client::Error;
use ovsdb_tunnel::ssh::SigningKey;
use ovsdb_tunnel::ConnectionProfile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub fn fixture_key() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/id_ed25519")
}

pub fn profile(host: &str, jump_hosts: &[&str]) -> ConnectionProfile {
    ConnectionProfile::new(host, "admin", fixture_key()).with_jump_hosts(jump_hosts.iter().copied())
}

/// Shared, ordered event log
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// How a [`RecordingConnector`] treats one host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopBehavior {
    Fail,
    Hang,
}

#[derive(Debug, Default)]
pub struct RecordingConnector {
    pub log: EventLog,
    behaviors: Mutex<Vec<(String, HopBehavior)>>,
}

impl RecordingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the handshake with `host` fail or never complete
    pub fn set_behavior(&self, host: &str, behavior: HopBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .push((host.to_string(), behavior));
    }

    fn behavior(&self, host: &str) -> Option<HopBehavior> {
        self.behaviors
            .lock()
            .unwrap()
            .iter()
            .find(|(h, _)| h == host)
            .map(|(_, b)| *b)
    }
}

#[async_trait]
impl SshConnector for RecordingConnector {
    async fn dial_direct(&self, host: &str, port: u16) -> Result<BoxedStream, Error> {
        self.log.push(format!("direct {host}:{port}"));
        let (stream, _) = tokio::io::duplex(64);
        Ok(Box::new(stream))
    }

    async fn handshake(
        &self,
        _stream: BoxedStream,
        hop: &HopTarget,
        _key: &SigningKey,
    ) -> Result<SharedSession, Error> {
        self.log.push(format!("handshake {hop}"));
        match self.behavior(&hop.host) {
            Some(HopBehavior::Fail) => return Err(Error::KeyAuthFailed(hop.user.clone())),
            Some(HopBehavior::Hang) => std::future::pending::<()>().await,
            None => {}
        }
        Ok(Arc::new(RecordingSession {
            name: hop.host.clone(),
            log: self.log.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug)]
pub struct RecordingSession {
    name: String,
    log: EventLog,
    closed: AtomicBool,
}

#[async_trait]
impl SshSession for RecordingSession {
    async fn dial_tcp(&self, host: &str, port: u16) -> Result<BoxedStream, Error> {
        self.log.push(format!("dial {host}:{port} via {}", self.name));
        let (stream, _) = tokio::io::duplex(64);
        Ok(Box::new(stream))
    }

    async fn dial_unix(&self, path: &str) -> Result<BoxedStream, Error> {
        self.log.push(format!("dial unix:{path} via {}", self.name));
        let (stream, _) = tokio::io::duplex(64);
        Ok(Box::new(stream))
    }

    async fn close(&self) -> Result<(), Error> {
        self.closed.store(true, Ordering::SeqCst);
        self.log.push(format!("close {}", self.name));
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Connector whose sessions reach local sockets directly
#[derive(Debug, Default)]
pub struct LoopbackConnector {
    pub session: Arc<LoopbackSession>,
}

impl LoopbackConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl SshConnector for LoopbackConnector {
    async fn dial_direct(&self, _host: &str, _port: u16) -> Result<BoxedStream, Error> {
        let (stream, _) = tokio::io::duplex(64);
        Ok(Box::new(stream))
    }

    async fn handshake(
        &self,
        _stream: BoxedStream,
        _hop: &HopTarget,
        _key: &SigningKey,
    ) -> Result<SharedSession, Error> {
        Ok(Arc::clone(&self.session) as SharedSession)
    }
}

#[derive(Debug, Default)]
pub struct LoopbackSession {
    /// Number of upcoming dials to refuse
    pub fail_dials: AtomicUsize,
    pub dialed: EventLog,
    pub closes: AtomicUsize,
}

impl LoopbackSession {
    fn refuse(&self) -> Result<(), Error> {
        let remaining = self.fail_dials.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_dials.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "administratively prohibited",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SshSession for LoopbackSession {
    async fn dial_tcp(&self, host: &str, port: u16) -> Result<BoxedStream, Error> {
        self.dialed.push(format!("tcp:{host}:{port}"));
        self.refuse()?;
        Ok(Box::new(TcpStream::connect((host, port)).await?))
    }

    #[cfg(unix)]
    async fn dial_unix(&self, path: &str) -> Result<BoxedStream, Error> {
        self.dialed.push(format!("unix:{path}"));
        self.refuse()?;
        Ok(Box::new(tokio::net::UnixStream::connect(path).await?))
    }

    #[cfg(not(unix))]
    async fn dial_unix(&self, path: &str) -> Result<BoxedStream, Error> {
        self.dialed.push(format!("unix:{path}"));
        Err(Error::AddressInvalid(path.to_string()))
    }

    async fn close(&self) -> Result<(), Error> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closes.load(Ordering::SeqCst) > 0
    }
}

/// Echo server on an ephemeral loopback port; returns `host:port`
pub async fn spawn_tcp_echo() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(echo(stream));
        }
    });
    addr.to_string()
}

/// Echo server on a Unix socket inside `dir`; returns the socket path
#[cfg(unix)]
pub fn spawn_unix_echo(dir: &std::path::Path) -> String {
    let path = dir.join("remote-db.sock");
    let listener = tokio::net::UnixListener::bind(&path).unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(echo(stream));
        }
    });
    path.to_string_lossy().into_owned()
}

async fn echo<S>(mut stream: S)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if stream.write_all(&buf[..n]).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Write `payload` and read the same number of bytes back
pub async fn round_trip<S>(stream: &mut S, payload: &[u8]) -> Vec<u8>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    stream.write_all(payload).await.unwrap();
    let mut received = vec![0u8; payload.len()];
    stream.read_exact(&mut received).await.unwrap();
    received
}
