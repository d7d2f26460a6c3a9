use tempfile::TempDir;

use vitshare::common::{AppConfig, AppError};
use vitshare::service::ShareService;

fn config_with_port(port: u16, receive_dir: &TempDir) -> AppConfig {
    AppConfig {
        port,
        receive_dir: receive_dir.path().to_path_buf(),
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn stop_releases_the_port_for_an_immediate_restart() {
    let receive_dir = TempDir::new().unwrap();

    // learn a free port
    let probe = ShareService::new(config_with_port(0, &receive_dir));
    let info = probe.start().await.expect("probe start");
    let port = info.port;
    probe.stop().await;

    // fixed-port service: start, stop, immediately start again
    let service = ShareService::new(config_with_port(port, &receive_dir));
    let first = service.start().await.expect("first start");
    assert_eq!(first.port, port);
    service.stop().await;

    let second = service.start().await.expect("restart on same port");
    assert_eq!(second.port, port);
    service.stop().await;
}

#[tokio::test]
async fn occupied_port_fails_fast_and_leaves_state_untouched() {
    let receive_dir = TempDir::new().unwrap();

    // occupy a port outside the service
    let blocker = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = blocker.local_addr().unwrap().port();

    let service = ShareService::new(config_with_port(port, &receive_dir));
    service.registry().add("/tmp/some-share");

    let err = service.start().await.expect_err("bind must fail");
    assert!(matches!(err, AppError::PortInUse(p) if p == port));

    // registry untouched, service not running: a retry stays possible
    assert_eq!(service.registry().list().len(), 1);
    assert!(!service.is_running().await);

    drop(blocker);
    let info = service.start().await.expect("retry succeeds");
    assert_eq!(info.port, port);
    service.stop().await;
}

#[tokio::test]
async fn only_one_server_per_service_at_a_time() {
    let receive_dir = TempDir::new().unwrap();
    let service = ShareService::new(config_with_port(0, &receive_dir));

    let _info = service.start().await.expect("start");
    let err = service.start().await.expect_err("second start must fail");
    assert!(matches!(err, AppError::Conflict(_)));

    service.stop().await;
    assert!(!service.is_running().await);
}

#[tokio::test]
async fn passwords_rotate_per_server_session() {
    let receive_dir = TempDir::new().unwrap();
    let service = ShareService::new(config_with_port(0, &receive_dir));

    let first = service.start().await.expect("start");
    service.stop().await;
    let second = service.start().await.expect("restart");
    service.stop().await;

    assert_eq!(first.password.len(), second.password.len());
    assert_ne!(first.password, second.password);
}
