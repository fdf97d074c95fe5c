//! Checking recorded transitions against the reducer that produced them.
//!
//! A fixture holds the textual state before and after an action. Replaying
//! it restores the prior state and the action from text, runs the reducer and
//! compares the result with the restored effect.

use crate::describe::{DecodeError, Describe, Restore};
use crate::export::Fixture;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("could not restore {part}: {source}")]
    Decode {
        part: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error("reducer produced a different effect\nexpected: {expected}\n  actual: {actual}")]
    Mismatch { expected: String, actual: String },
}

fn restore<T: Restore>(part: &'static str, text: &str) -> Result<T, ReplayError> {
    T::from_text(text).map_err(|source| ReplayError::Decode { part, source })
}

/// Apply `reducer` to the fixture's context and action and compare with its effect.
pub fn verify_fixture<S, A, R>(fixture: &Fixture, reducer: R) -> Result<S, ReplayError>
where
    S: Restore + Describe + PartialEq,
    A: Restore,
    R: FnOnce(&S, A) -> S,
{
    let context: S = restore("context", &fixture.context)?;
    let action: A = restore("cause", &fixture.cause.action)?;
    let expected: S = restore("effect", &fixture.effect)?;

    let actual = reducer(&context, action);
    if actual == expected {
        Ok(actual)
    } else {
        Err(ReplayError::Mismatch {
            expected: expected.to_text(),
            actual: actual.to_text(),
        })
    }
}
