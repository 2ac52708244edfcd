//! Assertion helpers for ceremony outcomes

use std::fmt::Debug;

use crate::error::WebAuthnError;

/// Assert that `result` failed with the error kind identified by `code`
///
/// # Panics
///
/// Panics if `result` is `Ok` or fails with a different error kind.
pub fn assert_error_code<T: Debug>(result: &Result<T, WebAuthnError>, code: u16) {
    match result {
        Ok(value) => panic!("Expected error code {code}, got Ok({value:?})"),
        Err(err) => assert_eq!(
            err.code(),
            code,
            "Expected error code {code}, got {err}"
        ),
    }
}

/// Assert that `result` failed with the same error kind as `expected`, ignoring messages
///
/// # Panics
///
/// Panics if `result` is `Ok` or fails with a different error kind.
pub fn assert_error_kind<T: Debug>(result: &Result<T, WebAuthnError>, expected: &WebAuthnError) {
    assert_error_code(result, expected.code());
}
