/// Configuration management for the API server
///
/// Loads configuration from environment variables once at startup.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: Bind address (default: 0.0.0.0:8080)
/// - `API_PRODUCTION`: Production flag; disables the dev bypass, enables HSTS
/// - `CORS_ORIGINS`: Comma-separated origins, `*` for permissive (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `ISSUER_JWT_SECRET`: HS256 secret for external credentials (required)
/// - `ISSUER_NAME` / `ISSUER_AUDIENCE`: Expected `iss` / `aud` claims
/// - `ISSUER_ADMIN_URL` / `ISSUER_SERVICE_KEY`: Issuer lookup-by-subject API
/// - `SUPER_ADMIN_EMAILS`: Comma-separated super-admin allow-list
/// - `DEFAULT_TENANT_ID`: Tenant for newly provisioned accounts
/// - `RUST_LOG` / `LOG_FORMAT`: Log filter and output format (`json` or text)
///
/// # Example
///
/// ```no_run
/// use taskline_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use taskline_shared::auth::issuer::JwtIssuerConfig;
use taskline_shared::auth::super_admin::SuperAdminList;
use taskline_shared::models::tenant::DEFAULT_TENANT_ID;
use uuid::Uuid;

/// Minimum length of the issuer secret
pub const MIN_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Identity issuer configuration
    pub issuer: JwtIssuerConfig,

    /// Super-admin allow-list
    pub super_admins: SuperAdminList,

    /// Tenant assigned to newly provisioned accounts
    pub default_tenant_id: Uuid,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Whether this is a production deployment
    pub production: bool,

    /// Allowed CORS origins (`*` = any)
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is
    /// malformed (port, pool size, secret length, tenant UUID).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is not a valid port: {}", e))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?;

        let secret = env::var("ISSUER_JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("ISSUER_JWT_SECRET environment variable is required"))?;

        if secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!(
                "ISSUER_JWT_SECRET must be at least {} characters long",
                MIN_SECRET_LENGTH
            );
        }

        let default_tenant_id = match optional_var("DEFAULT_TENANT_ID") {
            Some(value) => Uuid::parse_str(&value)
                .map_err(|e| anyhow::anyhow!("DEFAULT_TENANT_ID is not a UUID: {}", e))?,
            None => DEFAULT_TENANT_ID,
        };

        Ok(Self {
            api: ApiConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: api_port,
                production: parse_flag(env::var("API_PRODUCTION").ok().as_deref()),
                cors_origins: parse_list(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string())),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            issuer: JwtIssuerConfig {
                secret,
                issuer: optional_var("ISSUER_NAME"),
                audience: optional_var("ISSUER_AUDIENCE"),
                admin_url: optional_var("ISSUER_ADMIN_URL"),
                service_key: optional_var("ISSUER_SERVICE_KEY"),
            },
            super_admins: SuperAdminList::from_csv(
                &env::var("SUPER_ADMIN_EMAILS").unwrap_or_default(),
            ),
            default_tenant_id,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether the development bypass must be refused
    pub fn is_production(&self) -> bool {
        self.api.production
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// `true`, `1` and `yes` (any case) enable a flag
fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
