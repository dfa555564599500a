use std::time::Duration;

use super::*;
use crate::Error;
use crate::SystemError;
use crate::TransportError;

#[test]
fn test_resolve_endpoint_case1() {
    // # Case 1: plaintext
    assert_eq!(resolve_endpoint("grpc://127.0.0.1:5676").unwrap(), ResolvedEndpoint {
        uri: "http://127.0.0.1:5676".into(),
        tls: false,
    });

    // # Case 2: TLS
    assert_eq!(resolve_endpoint("grpcs://mads.example:443").unwrap(), ResolvedEndpoint {
        uri: "https://mads.example:443".into(),
        tls: true,
    });

    // # Case 3: any other scheme
    assert!(matches!(
        resolve_endpoint("https://mads.example:443"),
        Err(Error::Transport(TransportError::InvalidScheme(_)))
    ));

    // # Case 4: no scheme or no host
    assert!(matches!(
        resolve_endpoint("127.0.0.1:5676"),
        Err(Error::Transport(TransportError::InvalidUri(_)))
    ));
    assert!(matches!(
        resolve_endpoint("grpc://"),
        Err(Error::Transport(TransportError::InvalidUri(_)))
    ));
}

#[tokio::test]
async fn dial_should_fail_when_nothing_listens() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig {
        server_url: format!("grpc://{addr}"),
        connect_timeout: Duration::from_millis(500),
        ..ClientConfig::default()
    };

    assert!(matches!(dial(&config).await, Err(Error::Transport(_))));
}

#[tokio::test]
async fn dial_should_fail_with_missing_ca_file() {
    let config = ClientConfig {
        server_url: "grpcs://127.0.0.1:5676".into(),
        ca_certificate_path: Some("/definitely/not/here.pem".into()),
        ..ClientConfig::default()
    };

    assert!(matches!(
        dial(&config).await,
        Err(Error::System(SystemError::Io(_)))
    ));
}
