//! Test-only helpers for mutating process-global environment state.
//!
//! ```rust
//! use dify_async::test_support::EnvGuard;
//! use serial_test::serial;
//!
//! #[test]
//! #[serial(env)]
//! fn example() {
//!     let _env = EnvGuard::apply(&[("DIFY_API_KEY", Some("k")), ("DIFY_API_URL", None)]);
//!     // ... test body ...
//! }
//! ```

/// Sets or clears a batch of environment variables and restores all of them
/// on drop.
///
/// Only use from tests marked `#[serial(env)]`: `set_var`/`remove_var` race
/// with any concurrent environment access.
pub struct EnvGuard {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    /// Applies each `(key, value)`; `None` removes the variable.
    #[must_use]
    pub fn apply(vars: &[(&'static str, Option<&str>)]) -> Self {
        let saved = vars
            .iter()
            .map(|(key, value)| {
                let prev = std::env::var(key).ok();
                // SAFETY: callers serialize env access with `#[serial(env)]`.
                unsafe {
                    match value {
                        Some(v) => std::env::set_var(key, v),
                        None => std::env::remove_var(key),
                    }
                }
                (*key, prev)
            })
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, prev) in self.saved.iter().rev() {
            // SAFETY: see `EnvGuard::apply`.
            unsafe {
                match prev {
                    Some(v) => std::env::set_var(key, v),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}
