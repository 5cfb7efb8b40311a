//! Constant-time byte comparison.
//!
//! Running time depends only on the lengths of the inputs, never on their
//! contents: every byte position up to the longer length is visited, and
//! neither a length mismatch nor a matched prefix ends the loop early.

use subtle::{Choice, ConstantTimeEq};

/// Compare `received` against `expected` without leaking the position of the
/// first difference.
pub fn constant_time_eq(received: &[u8], expected: &[u8]) -> bool {
    compare_visiting(received, expected, |_| {})
}

fn compare_visiting(received: &[u8], expected: &[u8], mut visit: impl FnMut(usize)) -> bool {
    let lengths_match = (received.len() as u64).ct_eq(&(expected.len() as u64));
    let span = received.len().max(expected.len());

    let mut bytes_match = Choice::from(1u8);
    for i in 0..span {
        visit(i);
        let a = received.get(i).copied().unwrap_or(0);
        let b = expected.get(i).copied().unwrap_or(0);
        bytes_match &= a.ct_eq(&b);
    }

    bool::from(lengths_match & bytes_match)
}
