// tests/property/roundtrip_test.rs

//! Property-based tests for delivery: whatever parameters a publisher sends
//! arrive at the subscriber unchanged.

use crate::test_helpers::RecordingSink;
use proptest::collection::btree_map;
use proptest::prelude::*;
use pushbridge::core::bridge::extract_bearer_token;
use pushbridge::core::{CommandMessage, PublishBridge, SessionRegistry};
use std::sync::Arc;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_parameters_arrive_verbatim(
        token in "[a-zA-Z0-9]{1,40}",
        api in "[a-z]{1,20}",
        command in "[a-z_]{1,20}",
        parameters in btree_map(".{0,20}", ".{0,100}", 0..10)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let registry = Arc::new(SessionRegistry::new());
            let sink = RecordingSink::new();
            registry.admit(&token, sink.clone()).unwrap();
            let bridge = PublishBridge::new(registry);

            bridge
                .submit(
                    Some(&format!("Bearer {token}")),
                    &api,
                    &command,
                    parameters.clone(),
                )
                .await
                .unwrap();

            let frames = sink.frames();
            assert_eq!(frames.len(), 1);
            let message = CommandMessage::from_frame(&frames[0]).unwrap().unwrap();
            assert_eq!(message.api, api);
            assert_eq!(message.command, command);
            assert_eq!(message.parameters, parameters);
        });
    }

    #[test]
    fn test_bearer_token_is_first_word(
        token in "[^ ]{1,64}",
        trailer in "( [a-z]{0,10}){0,3}"
    ) {
        let header = format!("Bearer {token}{trailer}");
        prop_assert_eq!(extract_bearer_token(Some(&header)).unwrap(), token.as_str());
    }
}
