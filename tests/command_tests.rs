//! Registry and decode integration tests: commands looked up from the
//! catalog, driven through a mock transport, decoded end to end.

use obd2_rs::obd2::transport_mock::MockTransport;
use obd2_rs::{commands, Command, Obd2, Value};

fn session(mock: &MockTransport) -> Obd2 {
    Obd2::with_transport(Box::new(mock.clone()), true)
}

#[tokio::test]
async fn test_rpm_round_trip() {
    let mock = MockTransport::car_connected();
    mock.queue_message(&[&[0x41, 0x0C, 0x1A, 0xF8]]);
    let mut obd = session(&mock);

    let rpm = commands::registry().by_name("RPM").unwrap();
    let response = obd.query(rpm, true).await;

    assert_eq!(mock.sent_requests(), vec![b"010C".to_vec()]);
    assert_eq!(
        response.value.as_ref().and_then(Value::as_numeric),
        Some(1726.0)
    );
    assert_eq!(response.unit, "rpm");
    assert_eq!(response.command.as_ref().unwrap().name, "RPM");
    assert!(response.timestamp.is_some());
}

#[tokio::test]
async fn test_stored_dtc_round_trip() {
    let mock = MockTransport::car_connected();
    // two stored codes plus padding
    mock.queue_message(&[&[0x43, 0x01, 0x33, 0x42, 0x04, 0x00, 0x00]]);
    let mut obd = session(&mock);

    // GET_DTC is in the base set; no force needed
    let get_dtc = commands::registry().by_name("GET_DTC").unwrap();
    let response = obd.query(get_dtc, false).await;

    assert_eq!(mock.sent_requests(), vec![b"03".to_vec()]);
    assert_eq!(
        response.value,
        Some(Value::Codes(vec!["P0133".to_string(), "P4204".to_string()]))
    );
}

#[tokio::test]
async fn test_clear_dtc_round_trip() {
    let mock = MockTransport::car_connected();
    // positive reply to mode 04 is the bare mode echo
    mock.queue_message(&[&[0x44]]);
    let mut obd = session(&mock);

    let clear = commands::registry().by_name("CLEAR_DTC").unwrap();
    let response = obd.query(clear, false).await;

    assert_eq!(mock.sent_requests(), vec![b"04".to_vec()]);
    assert_eq!(response.value, Some(Value::Raw(vec![])));
}

#[tokio::test]
async fn test_freeze_frame_uses_mode_02_echo() {
    let mock = MockTransport::car_connected();
    mock.queue_message(&[&[0x42, 0x0D, 0x50]]);
    let mut obd = session(&mock);

    let ff_speed = commands::registry().by_name("DTC_SPEED").unwrap();
    let response = obd.query(ff_speed, true).await;

    assert_eq!(mock.sent_requests(), vec![b"020D".to_vec()]);
    assert_eq!(
        response.value.as_ref().and_then(Value::as_numeric),
        Some(80.0)
    );
    assert_eq!(response.unit, "kph");
}

#[tokio::test]
async fn test_reply_for_wrong_pid_is_null() {
    let mock = MockTransport::car_connected();
    // speed reply to an RPM request
    mock.queue_message(&[&[0x41, 0x0D, 0x28]]);
    let mut obd = session(&mock);

    let rpm = commands::registry().by_name("RPM").unwrap();
    let response = obd.query(rpm, true).await;
    assert!(response.is_null());
}

#[test]
fn test_registry_commands_are_map_keys_by_identity() {
    use std::collections::HashMap;

    let rpm = commands::registry().by_name("RPM").unwrap();
    let clone = Command::new(
        "SOMETHING_ELSE",
        "same identity",
        0x01,
        Some(0x0C),
        7,
        false,
        &obd2_rs::obd2::decoders::RAW_BYTES,
    );

    let mut map: HashMap<Command, u32> = HashMap::new();
    map.insert(rpm.clone(), 1);
    // same (mode, pid) replaces the entry regardless of other fields
    map.insert(clone, 2);
    assert_eq!(map.len(), 1);
    assert_eq!(map[rpm], 2);
}

#[test]
fn test_response_serializes_to_json() {
    let rpm = commands::registry().by_name("RPM").unwrap();
    let response = obd2_rs::Response::new(rpm, Value::Numeric(1726.0), "rpm");
    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"name\":\"RPM\""));
    assert!(json.contains("1726"));
}
