//! Settings files and the session config derived from them

use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use sshtunnel::{
    AuthMethod, HostKey, HostKeyVerifier, KnownHostsVerifier, SessionPool, TunnelError,
    TunnelSettings,
};

const HOST_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAILM+rvN+ot98qgEN796jTiQfZfG1KaT0PtFDJ/XFSqti";

#[test]
fn test_settings_file_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tunnel.toml");
    let settings = TunnelSettings {
        connect_timeout_secs: 5,
        pool_idle_timeout_secs: 30,
        ..Default::default()
    };

    settings.save(&path).expect("save");
    let loaded = TunnelSettings::load(&path).expect("load");

    assert_eq!(loaded, settings);
    assert_eq!(loaded.pool_idle_timeout(), Some(Duration::from_secs(30)));
}

#[test]
fn test_unreadable_settings_report_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    // a directory cannot be read as a file
    let err = TunnelSettings::load(dir.path()).expect_err("directory is not a file");
    assert!(err.to_string().contains(&dir.path().display().to_string()));
}

#[test]
fn test_session_config_verifies_against_configured_known_hosts() {
    let mut known_hosts = tempfile::NamedTempFile::new().expect("known_hosts");
    writeln!(known_hosts, "[bastion.example.com]:2222 {}", HOST_KEY).expect("write");

    let settings = TunnelSettings {
        known_hosts: Some(known_hosts.path().display().to_string()),
        ..Default::default()
    };
    let config = settings.session_config(Vec::new()).expect("session config");

    let key = HostKey::PublicKey(
        russh::keys::PublicKey::from_openssh(HOST_KEY).expect("parse key"),
    );
    let remote: SocketAddr = "192.0.2.1:2222".parse().expect("addr");

    config
        .host_key_verifier
        .verify("bastion.example.com:2222", remote, &key)
        .expect("listed host verifies");
    let err = config
        .host_key_verifier
        .verify("elsewhere.example.com:2222", remote, &key)
        .expect_err("unlisted host is rejected");
    assert!(matches!(err, TunnelError::HostKeyVerification(_)));

    let direct = KnownHostsVerifier::new(known_hosts.path());
    assert!(direct.verify("bastion.example.com:2222", remote, &key).is_ok());
}

#[test]
fn test_pool_from_settings_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tunnel.toml");
    std::fs::write(
        &path,
        format!(
            "connect_timeout_secs = 3\nknown_hosts = {:?}\nidentity_files = [{:?}]\n",
            dir.path().join("known_hosts").display().to_string(),
            dir.path().join("id_missing").display().to_string(),
        ),
    )
    .expect("write settings");

    let settings = TunnelSettings::load(&path).expect("load");
    let pool = SessionPool::from_settings(&settings, vec![AuthMethod::Agent]).expect("pool");

    assert!(pool.is_empty());
    assert_eq!(pool.config().timeout, Duration::from_secs(3));
    // the missing identity file is skipped
    assert_eq!(pool.config().auth.len(), 1);
}
