//! HTTP over the tunnel.
//!
//! [`TunnelConnector`] plugs [`TunnelClient::dial`] into hyper-util's pooled
//! client, so every HTTP connection is a `direct-tcpip` channel on the
//! identity's SSH session.

use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Request, Uri};
use http_body_util::Full;
use hyper_util::client::legacy::{Client, ResponseFuture};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use parking_lot::RwLock;
use tower::Service;

use crate::error::TunnelError;

use super::session::SessionConnector;
use super::tunnel::{TunnelClient, TunnelStream};

pub(crate) type PooledClient<C> = Client<TunnelConnector<C>, Full<Bytes>>;

/// HTTP/1 client whose connections go through one tunnel.
///
/// Every request goes to the tunnel's current connection pool. When the
/// tunnel reconnects it replaces that pool, so handles held across a
/// reconnect never reuse a connection that rode the old session.
pub struct HttpClient<C: SessionConnector> {
    pool: Arc<RwLock<PooledClient<C>>>,
}

impl<C: SessionConnector> Clone for HttpClient<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<C: SessionConnector> HttpClient<C> {
    pub(crate) fn new(pool: Arc<RwLock<PooledClient<C>>>) -> Self {
        Self { pool }
    }

    pub fn request(&self, req: Request<Full<Bytes>>) -> ResponseFuture {
        self.pool.read().request(req)
    }

    pub fn get(&self, uri: Uri) -> ResponseFuture {
        self.pool.read().get(uri)
    }
}

impl<C: SessionConnector> std::fmt::Debug for HttpClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

/// hyper connector that dials through a [`TunnelClient`].
///
/// Holds a weak reference; once the tunnel client is dropped, new
/// connections fail with [`TunnelError::Channel`].
pub struct TunnelConnector<C: SessionConnector> {
    client: Weak<TunnelClient<C>>,
}

impl<C: SessionConnector> Clone for TunnelConnector<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<C: SessionConnector> Service<Uri> for TunnelConnector<C> {
    type Response = TokioIo<TunnelStream<C>>;
    type Error = TunnelError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move {
            let address = dial_address(&uri)?;
            let client = client
                .upgrade()
                .ok_or_else(|| TunnelError::Channel("tunnel client dropped".to_string()))?;
            let stream = client.dial("tcp", &address).await?;
            Ok(TokioIo::new(stream))
        })
    }
}

/// `host:port` to dial for a request URI.
///
/// Only plain `http` is dialed; `https` needs TLS on top of the tunnel,
/// which is not provided.
pub fn dial_address(uri: &Uri) -> Result<String, TunnelError> {
    let scheme = uri.scheme_str().unwrap_or("http");
    let default_port = match scheme {
        "http" => 80,
        "https" => return Err(TunnelError::TlsNotImplemented),
        other => {
            return Err(TunnelError::InvalidAddress {
                address: uri.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            });
        }
    };

    let host = uri.host().ok_or_else(|| TunnelError::InvalidAddress {
        address: uri.to_string(),
        reason: "missing host".to_string(),
    })?;
    let port = uri.port_u16().unwrap_or(default_port);

    // Uri::host keeps the brackets on IPv6 literals
    if host.contains(':') && !host.starts_with('[') {
        Ok(format!("[{}]:{}", host, port))
    } else {
        Ok(format!("{}:{}", host, port))
    }
}

pub(crate) fn build_http_client<C: SessionConnector>(
    client: Weak<TunnelClient<C>>,
    pool_idle_timeout: Option<Duration>,
) -> PooledClient<C> {
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(pool_idle_timeout)
        .pool_timer(TokioTimer::new())
        .build(TunnelConnector { client })
}
