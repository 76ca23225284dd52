//! Session pool identity semantics

use std::sync::Arc;

use sshtunnel::{AcceptAnyHostKey, AuthMethod, ConnectionIdentity, SessionConfig, SessionPool};

use super::fixtures::ScriptedConnector;

fn pool(connector: &ScriptedConnector) -> SessionPool<ScriptedConnector> {
    SessionPool::with_connector(
        SessionConfig::new(Arc::new(AcceptAnyHostKey)).with_auth(AuthMethod::Agent),
        connector.clone(),
    )
}

#[tokio::test]
async fn test_same_identity_shares_one_session() {
    let connector = ScriptedConnector::new();
    let pool = pool(&connector);
    let identity = ConnectionIdentity::with_credentials("bastion", 22, "ops", "pw");

    let first = pool.get_client(&identity);
    first.dial("tcp", "svc:80").await.expect("first dial");
    let second = pool.get_client(&identity.clone());
    second.dial("tcp", "svc:81").await.expect("second dial");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.opens(), 2);
}

#[tokio::test]
async fn test_password_change_is_a_different_identity() {
    let connector = ScriptedConnector::new();
    let pool = pool(&connector);

    pool.get_client(&ConnectionIdentity::with_credentials("bastion", 22, "ops", "old"))
        .dial("tcp", "svc:80")
        .await
        .expect("dial with old password");
    pool.get_client(&ConnectionIdentity::with_credentials("bastion", 22, "ops", "new"))
        .dial("tcp", "svc:80")
        .await
        .expect("dial with new password");

    assert_eq!(pool.len(), 2);
    assert_eq!(connector.connects(), 2);
}

#[tokio::test]
async fn test_identity_username_reaches_the_connector() {
    let connector = ScriptedConnector::new();
    let pool = SessionPool::with_connector(
        SessionConfig::new(Arc::new(AcceptAnyHostKey)).with_user("default"),
        connector.clone(),
    );

    pool.get_client(&ConnectionIdentity::with_credentials("h", 22, "alice", "pw"))
        .connect()
        .await
        .expect("connect as alice");
    pool.get_client(&ConnectionIdentity::new("h", 22))
        .connect()
        .await
        .expect("connect with base user");

    assert_eq!(connector.users(), vec!["alice".to_string(), "default".to_string()]);
}

#[test]
fn test_pool_starts_empty_and_creates_lazily() {
    let connector = ScriptedConnector::new();
    let pool = pool(&connector);
    assert!(pool.is_empty());

    let identity = ConnectionIdentity::new("h", 2222);
    let client = pool.get_client(&identity);

    assert_eq!(client.identity(), &identity);
    assert_eq!(pool.identities(), vec![identity]);
    assert_eq!(connector.connects(), 0);
}
