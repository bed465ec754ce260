use std::time::Duration;

use device_client::fake::{demo_points, FakeClient};
use device_client::{ClientError, DeviceClient, DeviceSession};
use types::{DeviceConfig, ProtocolVersion, RawValue};

fn device() -> DeviceConfig {
    DeviceConfig {
        device_id: "meter-1".to_string(),
        address: "192.168.1.40".to_string(),
        local_key: "0123456789abcdef".to_string(),
    }
}

#[tokio::test]
async fn accepted_version_answers_with_points() {
    let client = FakeClient::accepting(ProtocolVersion::V3_3)
        .with_point("101", RawValue::Int(2381));

    let mut session = client.connect(&device()).await.expect("connect");
    session.set_timeout(Duration::from_secs(3));
    session.set_version(ProtocolVersion::V3_3);
    session.refresh_points(&["18", "19", "20"]).await.expect("refresh");

    let status = session.status().await.expect("status");
    assert!(status.error.is_none());
    assert_eq!(status.points.get("101"), Some(&RawValue::Int(2381)));
    assert_eq!(client.attempted_versions(), vec![ProtocolVersion::V3_3]);
    assert_eq!(client.refreshed_points(), vec!["18", "19", "20"]);
}

#[tokio::test]
async fn mismatched_version_fails_refresh_and_status() {
    let client = FakeClient::accepting(ProtocolVersion::V3_3);

    let mut session = client.connect(&device()).await.expect("connect");
    session.set_version(ProtocolVersion::V3_1);

    assert!(matches!(
        session.refresh_points(&["18"]).await,
        Err(ClientError::Protocol(_))
    ));
    assert!(matches!(
        session.status().await,
        Err(ClientError::Protocol(_))
    ));
}

#[tokio::test]
async fn unreachable_device_refuses_connections() {
    let client = FakeClient::unreachable();

    assert!(matches!(
        client.connect(&device()).await,
        Err(ClientError::Connect { .. })
    ));
}

#[tokio::test]
async fn payload_error_marker_is_passed_through() {
    let client = FakeClient::accepting(ProtocolVersion::V3_4)
        .with_points(demo_points())
        .with_payload_error("device busy");

    let mut session = client.connect(&device()).await.expect("connect");
    session.set_version(ProtocolVersion::V3_4);

    let status = session.status().await.expect("status");
    assert_eq!(status.error.as_deref(), Some("device busy"));
    assert!(!status.points.is_empty());
}
