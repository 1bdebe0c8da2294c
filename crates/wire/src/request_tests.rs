// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn request_json_shape() {
    let req = Request::Queue { job: "hello".into(), params: HashMap::new() };
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["type"], "Queue");
    assert_eq!(json["job"], "hello");
}

#[test]
fn params_default_to_empty() {
    let req: Request = serde_json::from_str(r#"{"type":"Run","job":"j"}"#).unwrap();
    assert_eq!(req, Request::Run { job: "j".into(), params: HashMap::new() });
}

#[test]
fn completed_carries_lowercase_result() {
    let resp =
        Response::Completed { job: "j".into(), num: 2, result: RunState::Success };
    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["result"], "success");
}
