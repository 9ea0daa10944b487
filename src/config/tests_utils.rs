//! Shared test utilities for config module tests.

use std::sync::Mutex;

use super::overrides::ALL_VARS;

/// Mutex to serialize environment variable tests and prevent race conditions.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clean up environment variables read by the configuration.
pub fn cleanup_env_vars() {
    for var in ALL_VARS {
        // SAFETY: callers hold ENV_MUTEX, so no other test thread touches the environment.
        unsafe { std::env::remove_var(var) };
    }
}

/// Set an environment variable for the duration of a locked test.
pub fn set_env_var(name: &str, value: &str) {
    // SAFETY: callers hold ENV_MUTEX.
    unsafe { std::env::set_var(name, value) };
}
