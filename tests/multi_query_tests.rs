//! Batched multi-PID queries: the precondition chain, combined-request
//! construction, and reassembly of the delimiter-less combined reply.

use obd2_rs::obd2::decoders;
use obd2_rs::obd2::transport_mock::MockTransport;
use obd2_rs::{commands, Command, ConnectionStatus, Obd2, Value};
use proptest::prelude::*;

fn session(mock: &MockTransport) -> Obd2 {
    Obd2::with_transport(Box::new(mock.clone()), true)
}

/// A fixed-length raw command for reassembly scenarios: `bytes` counts the
/// PID byte plus the payload.
fn raw_cmd(name: &'static str, pid: u8, bytes: usize) -> Command {
    Command::new(name, name, 0x01, Some(pid), bytes, true, &decoders::RAW_BYTES)
}

#[tokio::test]
async fn test_reassembly_splits_combined_reply() {
    let mock = MockTransport::car_connected();
    // echoed mode byte, then two answers back to back with no delimiter
    mock.queue_message(&[&[0x41, 0x0C, 0x1A, 0x2B, 0x00, 0x0D, 0x32]]);
    let mut obd = session(&mock);

    let a = raw_cmd("A", 0x0C, 4);
    let b = raw_cmd("B", 0x0D, 2);
    let responses = obd.query_multi(&[&a, &b], true).await;

    // one combined request: one mode token, two PID tokens, caller order
    assert_eq!(mock.sent_requests(), vec![b"010C0D".to_vec()]);

    assert_eq!(responses.len(), 2);
    assert_eq!(
        responses[&a].value,
        Some(Value::Raw(vec![0x1A, 0x2B, 0x00]))
    );
    assert_eq!(responses[&b].value, Some(Value::Raw(vec![0x32])));
}

#[tokio::test]
async fn test_reassembly_with_registry_commands() {
    let mock = MockTransport::car_connected();
    mock.queue_message(&[&[0x41, 0x0C, 0x1A, 0xF8, 0x0D, 0x28]]);
    let mut obd = session(&mock);

    let rpm = commands::registry().by_name("RPM").unwrap();
    let speed = commands::registry().by_name("SPEED").unwrap();
    let responses = obd.query_multi(&[rpm, speed], true).await;

    assert_eq!(
        responses[rpm].value.as_ref().and_then(Value::as_numeric),
        Some(1726.0)
    );
    assert_eq!(
        responses[speed].value.as_ref().and_then(Value::as_numeric),
        Some(40.0)
    );
}

#[tokio::test]
async fn test_reassembly_answers_out_of_request_order() {
    let mock = MockTransport::car_connected();
    // the vehicle answered B before A
    mock.queue_message(&[&[0x41, 0x0D, 0x32, 0x0C, 0x1A, 0x2B, 0x00]]);
    let mut obd = session(&mock);

    let a = raw_cmd("A", 0x0C, 4);
    let b = raw_cmd("B", 0x0D, 2);
    let responses = obd.query_multi(&[&a, &b], true).await;

    assert_eq!(
        responses[&a].value,
        Some(Value::Raw(vec![0x1A, 0x2B, 0x00]))
    );
    assert_eq!(responses[&b].value, Some(Value::Raw(vec![0x32])));
}

#[tokio::test]
async fn test_reassembly_truncated_tail_keeps_nulls() {
    let mock = MockTransport::car_connected();
    // one byte short for A, nothing for B
    mock.queue_message(&[&[0x41, 0x0C, 0x1A, 0x2B]]);
    let mut obd = session(&mock);

    let a = raw_cmd("A", 0x0C, 4);
    let b = raw_cmd("B", 0x0D, 2);
    let responses = obd.query_multi(&[&a, &b], true).await;

    assert_eq!(responses.len(), 2);
    assert!(responses[&a].is_null());
    assert!(responses[&b].is_null());
}

#[tokio::test]
async fn test_reassembly_stops_at_unattributable_pid() {
    let mock = MockTransport::car_connected();
    mock.queue_message(&[&[0x41, 0xAA, 0x1A, 0x2B, 0x0D, 0x32]]);
    let mut obd = session(&mock);

    let a = raw_cmd("A", 0x0C, 4);
    let b = raw_cmd("B", 0x0D, 2);
    let responses = obd.query_multi(&[&a, &b], true).await;

    assert_eq!(responses.len(), 2);
    assert!(responses[&a].is_null());
    assert!(responses[&b].is_null());
}

#[tokio::test]
async fn test_reassembly_partial_prefix_is_kept() {
    let mock = MockTransport::car_connected();
    // A answers fully, then an unknown PID cuts the walk short
    mock.queue_message(&[&[0x41, 0x0C, 0x1A, 0x2B, 0x00, 0xEE, 0x32]]);
    let mut obd = session(&mock);

    let a = raw_cmd("A", 0x0C, 4);
    let b = raw_cmd("B", 0x0D, 2);
    let responses = obd.query_multi(&[&a, &b], true).await;

    assert_eq!(
        responses[&a].value,
        Some(Value::Raw(vec![0x1A, 0x2B, 0x00]))
    );
    assert!(responses[&b].is_null());
}

#[tokio::test]
async fn test_rejects_without_connection() {
    let mock = MockTransport::with_protocol(ConnectionStatus::NotConnected, "");
    let mut obd = session(&mock);
    let a = raw_cmd("A", 0x0C, 4);

    let responses = obd.query_multi(&[&a], true).await;
    assert!(responses.is_empty());
    assert!(mock.sent_requests().is_empty());
}

#[tokio::test]
async fn test_rejects_non_can_protocol() {
    let mock = MockTransport::with_protocol(ConnectionStatus::CarConnected, "3");
    let mut obd = session(&mock);
    let a = raw_cmd("A", 0x0C, 4);

    let responses = obd.query_multi(&[&a], true).await;
    assert!(responses.is_empty());
    assert!(mock.sent_requests().is_empty());
}

#[tokio::test]
async fn test_rejects_zero_and_too_many_commands() {
    let mock = MockTransport::car_connected();
    let mut obd = session(&mock);

    assert!(obd.query_multi(&[], true).await.is_empty());

    let cmds: Vec<Command> = (0..7).map(|i| raw_cmd("N", 0x10 + i, 2)).collect();
    let refs: Vec<&Command> = cmds.iter().collect();
    assert!(obd.query_multi(&refs, true).await.is_empty());

    // six commands is within the ceiling and does transmit
    mock.queue_empty();
    let six: Vec<&Command> = cmds.iter().take(6).collect();
    assert!(obd.query_multi(&six, true).await.is_empty());
    assert_eq!(mock.sent_requests().len(), 1);
}

#[tokio::test]
async fn test_rejects_mixed_modes() {
    let mock = MockTransport::car_connected();
    let mut obd = session(&mock);

    let rpm = commands::registry().by_name("RPM").unwrap();
    let ff_rpm = commands::registry().by_name("DTC_RPM").unwrap();

    let responses = obd.query_multi(&[rpm, ff_rpm], true).await;
    assert!(responses.is_empty());
    assert!(mock.sent_requests().is_empty());
}

#[tokio::test]
async fn test_rejects_unsupported_unless_forced() {
    let mock = MockTransport::car_connected();
    let mut obd = session(&mock);

    // RPM was never discovered
    let rpm = commands::registry().by_name("RPM").unwrap();
    let responses = obd.query_multi(&[rpm], false).await;
    assert!(responses.is_empty());
    assert!(mock.sent_requests().is_empty());
}

#[tokio::test]
async fn test_no_reply_yields_empty_mapping() {
    let mock = MockTransport::car_connected();
    mock.queue_empty();
    let mut obd = session(&mock);

    let a = raw_cmd("A", 0x0C, 4);
    let responses = obd.query_multi(&[&a], true).await;
    assert!(responses.is_empty());
    assert_eq!(mock.sent_requests(), vec![b"010C".to_vec()]);
}

#[tokio::test]
async fn test_empty_carrier_keeps_all_null() {
    let mock = MockTransport::car_connected();
    mock.queue_message(&[&[]]);
    let mut obd = session(&mock);

    let a = raw_cmd("A", 0x0C, 4);
    let b = raw_cmd("B", 0x0D, 2);
    let responses = obd.query_multi(&[&a, &b], true).await;

    assert_eq!(responses.len(), 2);
    assert!(responses.values().all(|r| r.is_null()));
}

proptest! {
    /// Reassembly over arbitrary carrier bytes never panics and always
    /// produces exactly one entry per requested command.
    #[test]
    fn test_reassembly_is_total(carrier in proptest::collection::vec(any::<u8>(), 0..64)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let len = rt.block_on(async {
            let mock = MockTransport::car_connected();
            mock.queue_message(&[&carrier]);
            let mut obd = session(&mock);

            let rpm = commands::registry().by_name("RPM").unwrap();
            let speed = commands::registry().by_name("SPEED").unwrap();
            obd.query_multi(&[rpm, speed], true).await.len()
        });
        prop_assert_eq!(len, 2);
    }
}
