/// Asserts that a host message carries the given wire `type`.
#[macro_export]
macro_rules! assert_message_type {
    ($msg:expr, $kind:expr) => {
        let msg = &$msg;
        assert_eq!(
            msg.kind(),
            $kind,
            "Expected {} message, got {:?}",
            $kind,
            msg
        );
    };
}

/// Asserts that a host message is an ack for `request_id`.
#[macro_export]
macro_rules! assert_ack {
    ($msg:expr, $request_id:expr) => {
        match &$msg {
            gatebridge_data::HostMessage::Ack(id, _) => assert_eq!(
                *id, $request_id,
                "Ack for request {} instead of {}",
                id, $request_id
            ),
            other => panic!("Expected ack for {}, got {:?}", $request_id, other),
        }
    };
}

/// Asserts that no message of the given wire `type` appears in a batch.
#[macro_export]
macro_rules! assert_no_message {
    ($messages:expr, $kind:expr) => {
        let found: Vec<_> = $messages.iter().filter(|m| m.kind() == $kind).collect();
        assert!(found.is_empty(), "Unexpected {} messages: {:?}", $kind, found);
    };
}
