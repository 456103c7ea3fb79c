// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property-based tests for handler chain composition.

use gerr_handler::combinators::{stream_fn, unary_fn};
use gerr_handler::{
    BoxError, ChainBuilder, StreamContext, StreamServerInfo, UnaryContext, UnaryServerInfo,
};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use tonic::metadata::MetadataMap;

// ── Strategies ──────────────────────────────────────────────────────

/// `true` means the handler resolves the error, `false` means it passes it on
/// with its index appended.
fn arb_plan() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..12)
}

fn build(plan: &[bool], log: &Arc<Mutex<Vec<usize>>>) -> gerr_handler::HandlerChain {
    let mut builder = ChainBuilder::new();
    for (index, resolves) in plan.iter().copied().enumerate() {
        let unary_log = log.clone();
        let stream_log = log.clone();
        builder = builder
            .unary(unary_fn(move |_ctx, err: BoxError| {
                unary_log.lock().unwrap().push(index);
                if resolves {
                    None
                } else {
                    Some(format!("{err}/{index}").into())
                }
            }))
            .stream(stream_fn(move |_ctx, err: BoxError| {
                stream_log.lock().unwrap().push(index);
                if resolves {
                    None
                } else {
                    Some(format!("{err}/{index}").into())
                }
            }));
    }
    builder.build()
}

fn expected_calls(plan: &[bool]) -> Vec<usize> {
    match plan.iter().position(|resolves| *resolves) {
        Some(stop) => (0..=stop).collect(),
        None => (0..plan.len()).collect(),
    }
}

fn expected_message(plan: &[bool]) -> Option<String> {
    if plan.iter().any(|resolves| *resolves) {
        return None;
    }
    let mut msg = String::from("e");
    for index in 0..plan.len() {
        msg.push_str(&format!("/{index}"));
    }
    Some(msg)
}

// ── 1. Unary chain: order, short-circuit, output ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]
    #[test]
    fn unary_chain_stops_at_first_resolution(plan in arb_plan()) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = build(&plan, &log);
        let metadata = MetadataMap::new();
        let info = UnaryServerInfo::new("/prop.Svc/Unary");
        let ctx = UnaryContext { metadata: &metadata, request: &(), info: &info };

        let out = chain.unary().handle(&ctx, Some("e".into()));

        prop_assert_eq!(log.lock().unwrap().clone(), expected_calls(&plan));
        prop_assert_eq!(out.map(|e| e.to_string()), expected_message(&plan));
    }
}

// ── 2. Stream chain: same contract ──────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]
    #[test]
    fn stream_chain_stops_at_first_resolution(plan in arb_plan()) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = build(&plan, &log);
        let metadata = MetadataMap::new();
        let info = StreamServerInfo::bidi("/prop.Svc/Stream");
        let ctx = StreamContext { metadata: &metadata, request: None, response: None, info: &info };

        let out = chain.stream().handle(&ctx, Some("e".into()));

        prop_assert_eq!(log.lock().unwrap().clone(), expected_calls(&plan));
        prop_assert_eq!(out.map(|e| e.to_string()), expected_message(&plan));
    }
}

// ── 3. Success path never reaches a handler ─────────────────────────

proptest! {
    #[test]
    fn no_error_never_invokes_handlers(plan in arb_plan()) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = build(&plan, &log);
        let metadata = MetadataMap::new();
        let info = UnaryServerInfo::new("/prop.Svc/Unary");
        let ctx = UnaryContext { metadata: &metadata, request: &(), info: &info };

        prop_assert!(chain.unary().handle(&ctx, None).is_none());
        prop_assert!(log.lock().unwrap().is_empty());
    }
}
