/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `me`: The caller's resolved account and effective role
/// - `tasks`: Visible-task listing and gated task writes
/// - `delegations`: Time-boxed admin delegation grants
/// - `directory`: Tenant member directory and invitations
/// - `dev`: Development-only role bypass (never mounted in production)

pub mod delegations;
pub mod dev;
pub mod directory;
pub mod health;
pub mod me;
pub mod tasks;
