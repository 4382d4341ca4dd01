//! Shared helpers for unit tests
//!
//! Compiled for this crate's tests and, through the `test-utils` feature, for
//! the reader crates' tests.

use once_cell::sync::Lazy;
use std::env;

/// Serializes tests that touch process environment variables
pub static ENV_MUTEX: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

/// RAII guard restoring environment variables on drop
pub struct EnvVarGuard {
    vars: Vec<(String, Option<String>)>,
}

impl EnvVarGuard {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Set a variable, remembering its previous value
    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.push((key.to_string(), env::var(key).ok()));
        // set_var is unsafe since edition 2024; ENV_MUTEX serializes callers
        unsafe {
            env::set_var(key, value);
        }
    }

    /// Remove a variable, remembering its previous value
    #[allow(dead_code)]
    pub fn remove(&mut self, key: &str) {
        self.vars.push((key.to_string(), env::var(key).ok()));
        unsafe {
            env::remove_var(key);
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.vars.iter().rev() {
            unsafe {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

impl Default for EnvVarGuard {
    fn default() -> Self {
        Self::new()
    }
}
