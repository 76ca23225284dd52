//! Scripted SSH transport for driving the public API without a server

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use sshtunnel::ssh::{Established, SessionConnector, Target, TunnelSession};
use sshtunnel::{ConnectionIdentity, SessionConfig, TunnelError};

/// Behaviour of the next stream-open
pub enum Open {
    /// Far end echoes every byte
    Echo,
    /// Far end answers a single HTTP request with this body
    Http(&'static str),
    Fail(TunnelError),
}

#[derive(Default)]
struct Script {
    connect_failures: VecDeque<TunnelError>,
    opens: VecDeque<Open>,
    keepalives: VecDeque<bool>,
}

/// Counts every transport call and replays scripted failures.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
    connects: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    keepalives: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    /// Users seen by connect, in order
    users: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, err: TunnelError) {
        self.script.lock().connect_failures.push_back(err);
    }

    pub fn open(&self, outcome: Open) {
        self.script.lock().opens.push_back(outcome);
    }

    pub fn keepalive(&self, alive: bool) {
        self.script.lock().keepalives.push_back(alive);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn keepalives(&self) -> usize {
        self.keepalives.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn users(&self) -> Vec<String> {
        self.users.lock().clone()
    }
}

pub struct ScriptedSession {
    connector: ScriptedConnector,
}

impl SessionConnector for ScriptedConnector {
    type Session = ScriptedSession;

    async fn connect(
        &self,
        _identity: &ConnectionIdentity,
        config: &SessionConfig,
    ) -> Result<Established<ScriptedSession>, TunnelError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.users.lock().push(config.user.clone());

        if let Some(err) = self.script.lock().connect_failures.pop_front() {
            return Err(err);
        }
        Ok(Established {
            session: ScriptedSession {
                connector: self.clone(),
            },
            certificate: None,
        })
    }
}

impl TunnelSession for ScriptedSession {
    type Stream = DuplexStream;

    async fn open_stream(&self, _target: &Target) -> Result<DuplexStream, TunnelError> {
        self.connector.opens.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .connector
            .script
            .lock()
            .opens
            .pop_front()
            .unwrap_or(Open::Echo);

        match outcome {
            Open::Fail(err) => Err(err),
            Open::Echo => Ok(spawn_echo()),
            Open::Http(body) => Ok(spawn_http(body)),
        }
    }

    async fn send_keepalive(&self) -> Result<(), TunnelError> {
        self.connector.keepalives.fetch_add(1, Ordering::SeqCst);
        let alive = self
            .connector
            .script
            .lock()
            .keepalives
            .pop_front()
            .unwrap_or(true);
        if alive {
            Ok(())
        } else {
            Err(TunnelError::EndOfStream)
        }
    }

    async fn close(&self) {
        self.connector.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn spawn_echo() -> DuplexStream {
    let (near, mut far) = tokio::io::duplex(4096);
    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        loop {
            match far.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if far.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    near
}

fn spawn_http(body: &'static str) -> DuplexStream {
    let (near, mut far) = tokio::io::duplex(64 * 1024);
    tokio::spawn(async move {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match far.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = far.write_all(response.as_bytes()).await;
        // hold the pipe open so the connection can return to the pool
        let _ = far.read(&mut buf).await;
    });
    near
}
