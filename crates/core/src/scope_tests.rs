// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn home_and_all_want_everything() {
    for scope in [MonitorScope::Home, MonitorScope::All] {
        assert!(scope.wants_status("any", None));
        assert!(scope.wants_status("any", Some(3)));
        assert!(!scope.wants_log("any", 3));
    }
}

#[test]
fn job_scope_filters_by_name() {
    let scope = MonitorScope::Job {
        name: "build".into(),
        page: 0,
        field: SortField::Number,
        desc: true,
    };
    assert!(scope.wants_status("build", None));
    assert!(scope.wants_status("build", Some(9)));
    assert!(!scope.wants_status("other", Some(9)));
}

#[test]
fn run_scope_filters_by_name_and_number() {
    let scope = MonitorScope::Run { name: "build".into(), num: 4 };
    assert!(scope.wants_status("build", Some(4)));
    assert!(!scope.wants_status("build", Some(5)));
    assert!(!scope.wants_status("build", None));
}

#[test]
fn log_scope_only_wants_log_bytes() {
    let scope = MonitorScope::Log { name: "build".into(), num: 4 };
    assert!(scope.wants_log("build", 4));
    assert!(!scope.wants_log("build", 5));
    assert!(!scope.wants_status("build", Some(4)));
}

#[test]
fn scope_serde_roundtrip() {
    let scopes = [
        MonitorScope::Home,
        MonitorScope::All,
        MonitorScope::Job {
            name: "j".into(),
            page: 2,
            field: SortField::Duration,
            desc: false,
        },
        MonitorScope::Run { name: "j".into(), num: 1 },
        MonitorScope::Log { name: "j".into(), num: 1 },
    ];
    for scope in scopes {
        let json = serde_json::to_string(&scope).unwrap();
        let back: MonitorScope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);
    }
}
