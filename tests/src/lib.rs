//! hotmod Testing
//!
//! Utilities for testing hot modules without real editors or timing luck:
//! on-disk module fixtures, a watch primitive driven by the test, a loader
//! that counts calls, and helpers to await reload events.

pub use serde_json;

pub mod watch;

pub use fixtures::{ModuleDir, sources};
pub use loader::CountingLoader;
pub use watch::{ManualFsWatch, next_discard, next_terminal};

/// Assert that a handle invokes to the given JSON value
#[macro_export]
macro_rules! assert_invokes {
    ($handle:expr, [$($arg:expr),*], $expected:expr) => {
        assert_eq!(
            $handle
                .invoke(vec![$($crate::serde_json::json!($arg)),*])
                .expect("invoke failed"),
            $crate::serde_json::json!($expected),
            "unexpected result from {:?}",
            $handle.path()
        );
    };
    ($handle:expr, $expected:expr) => {
        assert_eq!(
            $handle.invoke(vec![]).expect("invoke failed"),
            $crate::serde_json::json!($expected),
            "unexpected result from {:?}",
            $handle.path()
        );
    };
}
