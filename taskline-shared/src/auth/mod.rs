/// Identity and role resolution
///
/// Every authenticated request runs the same pipeline:
///
/// ```text
/// bearer credential
///   → issuer::IdentityIssuer::verify      (who does the issuer say this is?)
///   → identity::IdentityResolver::resolve (which local account is that?)
///   → role::evaluate                      (what role do they hold right now?)
///   → context::AuthContext                (handed to the handler)
/// ```
///
/// # Modules
///
/// - [`issuer`]: External identity issuer trait and the HS256 JWT implementation
/// - [`super_admin`]: Configured super-admin allow-list and self-heal
/// - [`identity`]: Identity resolution, ghost-account claims and invitations
/// - [`role`]: Effective role evaluation including time-boxed delegation
/// - [`delegation`]: Role-checked delegation grant operations
/// - [`authorization`]: Role requirements and the single-task access gate
/// - [`context`]: Per-request authentication context
///
/// # Example
///
/// ```no_run
/// use taskline_shared::auth::identity::IdentityResolver;
/// use taskline_shared::auth::issuer::{JwtIdentityIssuer, JwtIssuerConfig};
/// use taskline_shared::auth::role::evaluate;
/// use taskline_shared::auth::super_admin::SuperAdminList;
/// use taskline_shared::models::tenant::DEFAULT_TENANT_ID;
/// use chrono::Utc;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, bearer: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = JwtIdentityIssuer::new(JwtIssuerConfig::new("issuer-secret-at-least-32-bytes-long"));
/// let admins = SuperAdminList::from_csv("root@example.com");
/// let resolver = IdentityResolver::new(admins.clone(), DEFAULT_TENANT_ID);
///
/// let mut account = resolver.authenticate(&pool, &issuer, bearer).await?;
/// let role = evaluate(&pool, &mut account, &admins, Utc::now()).await?;
/// println!("{} is {:?}", account.email, role.role);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod context;
pub mod delegation;
pub mod identity;
pub mod issuer;
pub mod role;
pub mod super_admin;
