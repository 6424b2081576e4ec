//! # Taskline API Server Library
//!
//! HTTP surface over the identity, role and task-visibility engine in
//! `taskline-shared`.
//!
//! ## Modules
//!
//! - `app`: Application state, authentication middleware and router
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Stateless response middleware
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
