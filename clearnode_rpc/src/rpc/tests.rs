use {
    super::*,
    crate::domain::{ChannelStatus, U256},
    serde_json::json,
};

fn address(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

#[test]
fn method_names() {
    assert_eq!(Method::AuthRequest.as_str(), "auth_request");
    assert_eq!(Method::AuthChallenge.as_str(), "auth_challenge");
    assert_eq!(Method::AuthVerify.as_str(), "auth_verify");
    assert_eq!(Method::CreateChannel.as_str(), "create_channel");
    assert_eq!(Method::ResizeChannel.as_str(), "resize_channel");
    assert_eq!(Method::CloseChannel.as_str(), "close_channel");
    assert_eq!(Method::Transfer.as_str(), "transfer");
    assert_eq!(Method::GetLedgerBalances.as_str(), "get_ledger_balances");
    assert_eq!(Method::SubmitIntent.as_str(), "submit_intent");

    assert_eq!("create_channel".parse::<Method>().unwrap(), Method::CreateChannel);
    assert!("open_channel".parse::<Method>().is_err());
}

#[test]
fn raw_message_envelope() {
    let raw = RawMessage {
        method: "transfer".into(),
        params: json!({ "field": 1 }),
    };

    let serialized = serde_json::to_string(&raw).unwrap();

    assert_eq!(&serialized, r#"{"method":"transfer","params":{"field":1}}"#);

    let deserialized: RawMessage = serde_json::from_str(&serialized).unwrap();

    assert_eq!(raw, deserialized);
}

#[test]
fn create_channel_params() {
    let params = CreateChannel {
        chain_id: 11155111,
        token: address(0x11),
        counterparty: address(0x22),
        initial_allocation: "1000000".into(),
    };

    params.validate().unwrap();

    let serialized = serde_json::to_string(&params).unwrap();

    assert_eq!(
        &serialized,
        r#"{"chainId":11155111,"token":"0x1111111111111111111111111111111111111111","counterparty":"0x2222222222222222222222222222222222222222","initialAllocation":"1000000"}"#
    );

    let deserialized: CreateChannel = serde_json::from_str(&serialized).unwrap();

    assert_eq!(params, deserialized);
}

#[test]
fn create_channel_validation() {
    let valid = CreateChannel {
        chain_id: 1,
        token: address(0x11),
        counterparty: address(0x22),
        initial_allocation: "1000".into(),
    };

    assert_eq!(
        CreateChannel {
            counterparty: Address::ZERO,
            ..valid.clone()
        }
        .validate(),
        Err(ValidationError::ZeroAddress("counterparty"))
    );

    assert!(matches!(
        CreateChannel {
            initial_allocation: "one million".into(),
            ..valid
        }
        .validate(),
        Err(ValidationError::Amount(_))
    ));
}

#[test]
fn transfer_params() {
    let params = Transfer {
        channel_id: "0xchannel".into(),
        to: address(0x33),
        amount: "2500".into(),
        signature: "0xdeadbeef".into(),
    };

    params.validate().unwrap();

    let serialized = serde_json::to_string(&params).unwrap();

    assert_eq!(
        &serialized,
        r#"{"channelId":"0xchannel","to":"0x3333333333333333333333333333333333333333","amount":"2500","signature":"0xdeadbeef"}"#
    );
}

#[test]
fn transfer_digest_is_deterministic() {
    let channel_id: ChannelId = "0xchannel".into();
    let to = address(0x33);
    let amount: Amount = "2500".into();

    let digest = Transfer::digest(&channel_id, to, &amount);

    assert_eq!(digest, Transfer::digest(&channel_id, to, &amount));
    assert_ne!(digest, Transfer::digest(&channel_id, to, &"2501".into()));
    assert_ne!(digest, Transfer::digest(&"0xother".into(), to, &amount));
    assert_ne!(digest, Transfer::digest(&channel_id, address(0x34), &amount));
}

#[test]
fn close_channel_defaults() {
    let deserialized: CloseChannel =
        serde_json::from_str(r#"{"channelId":"ch-1"}"#).unwrap();

    assert_eq!(deserialized.channel_id, "ch-1".into());
    assert!(!deserialized.withdraw);
}

#[test]
fn channel_response_without_signatures() {
    let response: ChannelResponse = serde_json::from_value(json!({
        "channel": {
            "channelId": "ch-1",
            "status": "initial",
            "allocations": [{
                "destination": "0x2222222222222222222222222222222222222222",
                "token": "0x1111111111111111111111111111111111111111",
                "amount": "1000000",
            }],
            "token": "0x1111111111111111111111111111111111111111",
            "chainId": 11155111,
        },
    }))
    .unwrap();

    assert_eq!(response.channel.status, ChannelStatus::Initial);
    assert!(response.signatures.is_empty());
    assert_eq!(
        response.channel.allocations.first().unwrap().amount.parse().unwrap(),
        U256::from(1000000u64)
    );
}

#[test]
fn notification_channel_lifecycle() {
    let raw = RawMessage {
        method: "opened".into(),
        params: json!({
            "channelId": "ch-1",
            "status": "active",
            "allocations": [{
                "destination": "0x2222222222222222222222222222222222222222",
                "token": "0x1111111111111111111111111111111111111111",
                "amount": "1000000",
            }],
            "token": "0x1111111111111111111111111111111111111111",
            "chainId": 11155111,
        }),
    };

    let notification = Notification::from_raw(raw);

    let Notification::ChannelOpened(channel) = &notification else {
        panic!("expected ChannelOpened, got {notification:?}");
    };

    assert_eq!(channel.status, ChannelStatus::Active);
    assert_eq!(notification.method(), "opened");
    assert!(notification.channel().is_some());
    assert!(notification.intent_id().is_none());
}

#[test]
fn notification_quote_aliases() {
    let params = json!({
        "intentId": "intent-1",
        "solverId": "solver-1",
        "channelId": "ch-1",
        "amountIn": "1000000",
        "amountOut": "998500",
        "estimatedTime": 30,
    });

    for method in ["solver_quoted", "quote_accepted"] {
        let notification = Notification::from_raw(RawMessage {
            method: method.into(),
            params: params.clone(),
        });

        let Notification::SolverQuoted(update) = &notification else {
            panic!("expected SolverQuoted for {method}, got {notification:?}");
        };

        assert_eq!(update.intent_id, "intent-1".into());
        assert_eq!(update.timestamp, None);
        assert_eq!(notification.intent_id(), Some(&"intent-1".into()));
    }
}

#[test]
fn notification_unknown_method_is_preserved() {
    let raw = RawMessage {
        method: "totally_new_event".into(),
        params: json!({ "anything": true }),
    };

    let notification = Notification::from_raw(raw.clone());

    let Notification::Unknown { method, params } = &notification else {
        panic!("expected Unknown, got {notification:?}");
    };

    assert_eq!(method.as_ref(), "totally_new_event");
    assert_eq!(params, &raw.params);
}

#[test]
fn notification_malformed_payload_falls_back_to_unknown() {
    let raw = RawMessage {
        method: "settled".into(),
        params: json!({ "not": "a settlement" }),
    };

    assert!(matches!(
        Notification::from_raw(raw),
        Notification::Unknown { .. }
    ));
}

#[test]
fn error_reply_round_trip() {
    let reply = ErrorReply {
        method: "create_channel".into(),
        message: "insufficient funds".into(),
        code: Some(-32000),
    };

    let serialized = serde_json::to_string(&reply).unwrap();

    assert_eq!(
        &serialized,
        r#"{"method":"create_channel","message":"insufficient funds","code":-32000}"#
    );

    let deserialized: ErrorReply = serde_json::from_str(&serialized).unwrap();

    assert_eq!(reply, deserialized);
}
