use super::*;
use crate::Error;
use crate::MONITORING_ASSIGNMENT_TYPE_URL;

#[test]
fn test_request_json_accepts_missing_fields() {
    let request: DiscoveryRequest = serde_json::from_str(
        r#"{"node":{"id":"prometheus-01"},"type_url":"type.googleapis.com/mads.v1.MonitoringAssignment"}"#,
    )
    .unwrap();

    assert_eq!(request.node_id(), "prometheus-01");
    assert_eq!(request.version_info, "");
    assert!(request.resource_names.is_empty());
    assert!(!request.is_nack());
}

#[test]
fn test_payload_bytes_travel_as_base64() {
    let payload = TypedPayload {
        type_url: "t".to_string(),
        value: vec![0xde, 0xad, 0xbe, 0xef],
    };

    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["value"], "3q2+7w==");

    let back: TypedPayload = serde_json::from_value(json).unwrap();
    assert_eq!(back, payload);
}

#[test]
fn test_nack_keeps_acked_version_and_rejected_nonce() {
    let request = DiscoveryRequest::nack("c1", MONITORING_ASSIGNMENT_TYPE_URL, "v1", "nonce-2", "bad labels");

    assert_eq!(request.version_info, "v1");
    assert_eq!(request.response_nonce, "nonce-2");
    assert!(request.is_nack());
    assert_eq!(request.error_detail.unwrap().message, "bad labels");
}

#[test]
fn test_unpack_rejects_foreign_type() {
    let assignment = MonitoringAssignment {
        name: "/meshes/demo/dataplanes/web-01".to_string(),
        ..Default::default()
    };
    let payload = TypedPayload::pack("type.googleapis.com/other", &assignment);

    let result = payload.unpack::<MonitoringAssignment>(MONITORING_ASSIGNMENT_TYPE_URL);
    assert!(matches!(
        result,
        Err(Error::Protocol(ProtocolError::UnexpectedType { .. }))
    ));

    let ok = TypedPayload::pack(MONITORING_ASSIGNMENT_TYPE_URL, &assignment)
        .unpack::<MonitoringAssignment>(MONITORING_ASSIGNMENT_TYPE_URL)
        .unwrap();
    assert_eq!(ok, assignment);
}
