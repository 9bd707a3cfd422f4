mod common;

use common::{wire_bit, BridgeBuilder};
use gatebridge_data::{HostMessage, MemoryWrite, TriggerKind, WireSignal};
use serde_json::json;

#[tokio::test]
async fn test_unknown_command_is_ignored_without_reply() {
    let mut bridge = BridgeBuilder::new().spawn();
    bridge.load().await;
    bridge.send(json!({ "type": "teleport", "args": [1, 2, 3] }));
    bridge.send(json!({ "type": "ping", "args": [1] }));
    assert_ack!(bridge.next().await, 1);
    assert!(bridge.calls().is_empty());
    bridge.close().await;
}

#[tokio::test]
async fn test_malformed_payloads_do_not_stop_processing() {
    let mut bridge = BridgeBuilder::new().spawn();
    bridge.load().await;
    bridge.send(json!({ "type": "addGraph", "arg": "top" }));
    // Missing ports.
    bridge.send(json!({ "type": "addGate", "args": ["top", "broken"] }));
    // Input port without an input signal.
    bridge.send(json!({
        "type": "addGate",
        "args": ["top", "lamp", {}, [{ "id": "in", "dir": "in", "bits": 1 }], {}, {}]
    }));
    bridge.send(json!({ "type": "changeInput", "args": ["top", "sw", { "_bits": "one" }] }));
    bridge.send(json!({ "type": "ping", "args": [2] }));
    assert_ack!(bridge.next().await, 2);
    assert_eq!(bridge.calls(), vec!["addGraph top"]);
    bridge.close().await;
}

#[tokio::test]
async fn test_engine_errors_are_logged_and_skipped() {
    let mut bridge = BridgeBuilder::new().spawn();
    bridge.load().await;
    bridge.send(json!({ "type": "removeGate", "args": ["nowhere", "g"] }));
    bridge.send(json!({ "type": "addGraph", "arg": "top" }));
    bridge.send(json!({ "type": "ping", "args": [3] }));
    assert_ack!(bridge.next().await, 3);
    assert_eq!(bridge.calls(), vec!["removeGate nowhere g", "addGraph top"]);
    bridge.close().await;
}

#[tokio::test]
async fn test_memory_write_raises_gate_trigger() {
    let mut bridge = BridgeBuilder::new().spawn();
    bridge.load().await;
    bridge.send(json!({ "type": "addGraph", "arg": "top" }));
    bridge.send(json!({
        "type": "addGate",
        "args": ["top", "ram", { "type": "Memory", "words": 4, "bits": 8 }, [], {}, {}]
    }));
    let byte = json!({ "_bits": 8, "_avec": [0xa5], "_bvec": [0xff] });
    bridge.send(json!({ "type": "manualMemChange", "args": ["top", "ram", 2, byte] }));
    bridge.send(json!({ "type": "updateGates", "args": [4] }));

    let expected_data: WireSignal = serde_json::from_value(byte).unwrap();
    assert_eq!(
        bridge.next().await,
        HostMessage::GateTrigger(
            "top".into(),
            "ram".into(),
            TriggerKind::MemChange,
            MemoryWrite(2, expected_data)
        )
    );
    assert_ack!(bridge.next().await, 4);
    bridge.close().await;
}

#[tokio::test]
async fn test_subcircuit_and_removal_round_trip() {
    let mut bridge = BridgeBuilder::new().spawn();
    bridge.load().await;
    bridge.send(json!({ "type": "addGraph", "arg": "top" }));
    bridge.send(json!({ "type": "addGraph", "arg": "inner" }));
    bridge.send(json!({
        "type": "addGate",
        "args": ["top", "sub", {}, [{ "id": "out", "dir": "out", "bits": 1 }], {}, { "out": wire_bit(0) }]
    }));
    bridge.send(json!({
        "type": "addGate",
        "args": ["inner", "io1", {}, [{ "id": "in", "dir": "in", "bits": 1 }], { "in": wire_bit(0) }, {}]
    }));
    bridge.send(json!({ "type": "addSubcircuit", "args": ["top", "sub", "inner", { "out": "io1" }] }));
    bridge.send(json!({ "type": "observeGraph", "arg": "top" }));
    bridge.send(json!({ "type": "removeGate", "args": ["top", "sub"] }));
    bridge.send(json!({ "type": "ping", "args": [5, true] }));

    match bridge.next().await {
        HostMessage::Update(_, _, batch) => assert!(batch.is_empty(), "removed gate reported: {:?}", batch),
        other => panic!("Expected update, got {:?}", other),
    }
    assert_ack!(bridge.next().await, 5);
    assert_eq!(
        bridge.calls(),
        vec![
            "addGraph top",
            "addGraph inner",
            "addGate top sub",
            "addGate inner io1",
            "addSubcircuit top sub inner",
            "observeGraph top",
            "removeGate top sub",
        ]
    );
    bridge.close().await;
}
