//! HTTP requests routed through a tunnel

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};

use sshtunnel::{AcceptAnyHostKey, ConnectionIdentity, SessionConfig, SessionPool, TunnelError};

use super::fixtures::{Open, ScriptedConnector};

fn pool(connector: &ScriptedConnector) -> SessionPool<ScriptedConnector> {
    SessionPool::with_connector(SessionConfig::new(Arc::new(AcceptAnyHostKey)), connector.clone())
}

#[tokio::test]
async fn test_get_over_tunnel() {
    let connector = ScriptedConnector::new();
    connector.open(Open::Http("{\"status\":\"ok\"}"));
    let client = pool(&connector).get_client(&ConnectionIdentity::new("bastion", 22));

    let response = client
        .http_client()
        .get("http://api.internal:8080/health".parse().expect("uri"))
        .await
        .expect("request");

    assert_eq!(response.status(), http::StatusCode::OK);
    let body = response.into_body().collect().await.expect("body").to_bytes();
    assert_eq!(&body[..], b"{\"status\":\"ok\"}");
    assert_eq!(connector.opens(), 1);
}

#[tokio::test]
async fn test_post_over_tunnel() {
    let connector = ScriptedConnector::new();
    connector.open(Open::Http("created"));
    let client = pool(&connector).get_client(&ConnectionIdentity::new("bastion", 22));

    let request = http::Request::post("http://api.internal/items")
        .body(Full::new(Bytes::from_static(b"{\"name\":\"x\"}")))
        .expect("request");
    let response = client.http_client().request(request).await.expect("response");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_https_is_refused_before_dialing() {
    let connector = ScriptedConnector::new();
    let client = pool(&connector).get_client(&ConnectionIdentity::new("bastion", 22));

    let result = client
        .http_client()
        .get("https://api.internal/".parse().expect("uri"))
        .await;

    assert!(result.is_err());
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_reconnect_gives_a_fresh_http_pool() {
    let connector = ScriptedConnector::new();
    let client = pool(&connector).get_client(&ConnectionIdentity::new("bastion", 22));

    connector.open(Open::Http("one"));
    let response = client
        .http_client()
        .get("http://api.internal/".parse().expect("uri"))
        .await
        .expect("first request");
    response.into_body().collect().await.expect("drain");

    // Kill the session; the next dial reconnects and resets the HTTP pool
    connector.open(Open::Fail(TunnelError::EndOfStream));
    client.dial("tcp", "other:22").await.expect("reconnect");

    connector.open(Open::Http("two"));
    let response = client
        .http_client()
        .get("http://api.internal/".parse().expect("uri"))
        .await
        .expect("second request");
    let body = response.into_body().collect().await.expect("body").to_bytes();

    assert_eq!(&body[..], b"two");
    assert_eq!(connector.connects(), 2);
    // the first pooled connection was not reused
    assert_eq!(connector.opens(), 4);
}

#[tokio::test]
async fn test_handle_held_across_reconnect_uses_the_new_session() {
    let connector = ScriptedConnector::new();
    let client = pool(&connector).get_client(&ConnectionIdentity::new("bastion", 22));
    let http = client.http_client();

    connector.open(Open::Http("one"));
    let response = http
        .get("http://api.internal/".parse().expect("uri"))
        .await
        .expect("first request");
    response.into_body().collect().await.expect("drain");

    connector.open(Open::Fail(TunnelError::EndOfStream));
    client.dial("tcp", "other:22").await.expect("reconnect");

    connector.open(Open::Http("two"));
    let response = http
        .get("http://api.internal/".parse().expect("uri"))
        .await
        .expect("second request");
    let body = response.into_body().collect().await.expect("body").to_bytes();

    assert_eq!(&body[..], b"two");
    assert_eq!(connector.connects(), 2);
    // a fresh stream was dialed on the new session instead of reusing the pooled one
    assert_eq!(connector.opens(), 4);
}
