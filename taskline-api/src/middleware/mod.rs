/// Middleware modules for the API server
///
/// Authentication lives in [`crate::app`] since it needs the application
/// state; this module holds stateless layers.

pub mod security;
