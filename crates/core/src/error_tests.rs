// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn codes_are_stable_per_kind() {
    assert_eq!(CoreError::Validation("x".into()).code(), code::VALIDATION);
    assert_eq!(CoreError::not_found("x").code(), code::NOT_FOUND);
    assert_eq!(CoreError::state_conflict("x").code(), code::STATE_CONFLICT);
    assert_eq!(CoreError::graph_integrity("x").code(), code::GRAPH_INTEGRITY);
    assert_eq!(
        CoreError::reference_repeated("x").code(),
        code::REFERENCE_REPEATED
    );
    assert_eq!(CoreError::external("x").code(), code::EXTERNAL);
}

#[test]
fn messages_carry_context() {
    let e = CoreError::not_found("journal token T1");
    assert!(e.to_string().contains("T1"));
}
