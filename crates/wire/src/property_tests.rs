// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests for protocol serde roundtrips.
//!
//! Covers every variant of Request and Response with minimal fixed field
//! values, plus arbitrary-payload framing roundtrips.

use std::collections::HashMap;

use laminar_core::{MonitorScope, RunState, SortField};
use proptest::prelude::*;

use crate::framing::{decode, encode};
use crate::{Request, Response};

fn s() -> String {
    String::new()
}

fn all_requests() -> Vec<Request> {
    vec![
        Request::Queue { job: s(), params: HashMap::new() },
        Request::Start { job: s(), params: HashMap::new() },
        Request::Run { job: s(), params: HashMap::new() },
        Request::SetParam { job: s(), num: 0, key: s(), value: s() },
        Request::Abort { job: s(), num: 0 },
        Request::AbortAll,
        Request::Watch { scope: MonitorScope::Home },
        Request::Watch { scope: MonitorScope::All },
        Request::Watch {
            scope: MonitorScope::Job {
                name: s(),
                page: 0,
                field: SortField::Number,
                desc: false,
            },
        },
        Request::Watch { scope: MonitorScope::Run { name: s(), num: 0 } },
        Request::Watch { scope: MonitorScope::Log { name: s(), num: 0 } },
    ]
}

fn all_responses() -> Vec<Response> {
    vec![
        Response::Ok,
        Response::Queued { job: s() },
        Response::Started { job: s(), num: 0 },
        Response::Completed { job: s(), num: 0, result: RunState::Success },
        Response::Error { message: s() },
    ]
}

#[test]
fn every_request_roundtrips() {
    for request in all_requests() {
        let bytes = encode(&request).unwrap();
        let back: Request = decode(&bytes).unwrap();
        assert_eq!(back, request);
    }
}

#[test]
fn every_response_roundtrips() {
    for response in all_responses() {
        let bytes = encode(&response).unwrap();
        let back: Response = decode(&bytes).unwrap();
        assert_eq!(back, response);
    }
}

proptest! {
    #[test]
    fn queue_request_roundtrips_any_params(
        job in "[a-z]{1,12}",
        params in proptest::collection::hash_map("[A-Z_]{1,8}", ".{0,16}", 0..4),
    ) {
        let request = Request::Queue { job, params };
        let bytes = encode(&request).unwrap();
        let back: Request = decode(&bytes).unwrap();
        prop_assert_eq!(back, request);
    }

    #[test]
    fn framing_roundtrips_any_payload(
        payload in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(async {
                let mut buffer = Vec::new();
                crate::write_message(&mut buffer, &payload).await.unwrap();
                let mut cursor = std::io::Cursor::new(buffer);
                let back = crate::read_message(&mut cursor).await.unwrap();
                assert_eq!(back, payload);
            });
    }
}
