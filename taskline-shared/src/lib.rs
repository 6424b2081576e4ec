//! # Taskline Shared Library
//!
//! Identity, role and task-visibility resolution for the Taskline API, plus
//! the models and database plumbing they run on.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool and embedded migrations
//! - `models`: Database models and data structures
//! - `auth`: Identity resolution, effective roles, delegation and access checks
//! - `visibility`: Which tasks an account may read, and why

pub mod auth;
pub mod db;
pub mod models;
pub mod visibility;

/// Current version of the Taskline shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
