/// External identity issuer
///
/// The issuer is the service that authenticates people and hands out bearer
/// credentials. This module verifies those credentials and, when a verified
/// assertion lacks an email address, looks the subject up through the
/// issuer's admin API.
///
/// Credentials are HS256-signed JWTs. Besides the registered claims, the
/// issuer sets `email`, `name` and `picture` when it knows them.
///
/// # Example
///
/// ```
/// use taskline_shared::auth::issuer::{create_token, validate_token, IssuerClaims, JwtIssuerConfig};
/// use chrono::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = JwtIssuerConfig::new("issuer-secret-at-least-32-bytes-long");
///
/// let claims = IssuerClaims::new("sub-42", Some("bob@x.com"), Duration::hours(1));
/// let token = create_token(&claims, &config.secret)?;
///
/// let verified = validate_token(&token, &config)?;
/// assert_eq!(verified.sub, "sub-42");
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

/// Error type for issuer operations
#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    /// Failed to create a credential
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Credential signature, issuer, audience or format is invalid
    #[error("Invalid credential: {0}")]
    Invalid(String),

    /// Credential has expired
    #[error("Credential has expired")]
    Expired,

    /// Credential verified but carries no subject
    #[error("Credential has no subject")]
    MissingSubject,

    /// Lookup-by-subject request failed
    #[error("Issuer lookup failed: {0}")]
    Lookup(String),

    /// HTTP transport error talking to the issuer
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl IssuerError {
    /// Whether the failure is the caller's credential (as opposed to the issuer being unreachable)
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            IssuerError::Invalid(_) | IssuerError::Expired | IssuerError::MissingSubject
        )
    }
}

/// Verified identity assertion
///
/// `email` may be absent; the identity resolver backfills it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAssertion {
    /// Issuer-assigned subject
    pub subject: String,

    /// Email address, if the issuer included one
    pub email: Option<String>,

    /// Display name
    pub name: Option<String>,

    /// Avatar URL
    pub avatar_url: Option<String>,
}

impl IdentityAssertion {
    /// Creates an assertion with only a subject
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            name: None,
            avatar_url: None,
        }
    }
}

/// Claims carried by issuer credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerClaims {
    /// Subject
    pub sub: String,

    /// Email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl IssuerClaims {
    /// Creates claims valid for `expires_in` from now
    pub fn new(subject: &str, email: Option<&str>, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: subject.to_string(),
            email: email.map(str::to_string),
            name: None,
            picture: None,
            iss: None,
            aud: None,
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
        }
    }

    /// Converts verified claims into an assertion, dropping empty strings
    pub fn into_assertion(self) -> Result<IdentityAssertion, IssuerError> {
        if self.sub.trim().is_empty() {
            return Err(IssuerError::MissingSubject);
        }

        Ok(IdentityAssertion {
            subject: self.sub,
            email: non_empty(self.email),
            name: non_empty(self.name),
            avatar_url: non_empty(self.picture),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Issuer verification and lookup settings
#[derive(Debug, Clone)]
pub struct JwtIssuerConfig {
    /// Shared HS256 secret
    pub secret: String,

    /// Expected `iss` claim; not checked when `None`
    pub issuer: Option<String>,

    /// Expected `aud` claim; not checked when `None`
    pub audience: Option<String>,

    /// Base URL of the issuer's admin API; lookup is disabled when `None`
    pub admin_url: Option<String>,

    /// Key presented to the admin API
    pub service_key: Option<String>,
}

impl JwtIssuerConfig {
    /// Creates a config that only checks signatures and expiry
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
            audience: None,
            admin_url: None,
            service_key: None,
        }
    }
}

/// Signs issuer claims with HS256
///
/// The service itself never issues credentials; this exists for tests and
/// local development.
pub fn create_token(claims: &IssuerClaims, secret: &str) -> Result<String, IssuerError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| IssuerError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates an issuer credential and extracts its claims
///
/// Verifies the signature and expiry, plus `iss` / `aud` when configured.
pub fn validate_token(token: &str, config: &JwtIssuerConfig) -> Result<IssuerClaims, IssuerError> {
    let key = DecodingKey::from_secret(config.secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    if let Some(issuer) = &config.issuer {
        validation.set_issuer(&[issuer]);
    }
    match &config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let token_data = decode::<IssuerClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => IssuerError::Expired,
        _ => IssuerError::Invalid(e.to_string()),
    })?;

    Ok(token_data.claims)
}

/// The external identity issuer
///
/// Implemented by [`JwtIdentityIssuer`]; tests substitute their own.
#[async_trait]
pub trait IdentityIssuer: Send + Sync {
    /// Verifies an opaque bearer credential
    async fn verify(&self, credential: &str) -> Result<IdentityAssertion, IssuerError>;

    /// Looks up a subject's profile
    ///
    /// Returns `Ok(None)` when the subject is unknown or lookup is not configured.
    async fn lookup_subject(&self, subject: &str) -> Result<Option<IdentityAssertion>, IssuerError>;
}

/// Profile returned by the issuer's admin API
#[derive(Debug, Deserialize)]
struct IssuerUser {
    #[serde(default)]
    email: Option<String>,

    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    picture: Option<String>,
}

/// HS256 JWT verification with an optional HTTP lookup-by-subject
#[derive(Debug, Clone)]
pub struct JwtIdentityIssuer {
    config: JwtIssuerConfig,
    http_client: reqwest::Client,
}

impl JwtIdentityIssuer {
    /// Creates an issuer client
    pub fn new(config: JwtIssuerConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn user_url(&self, base: &str, subject: &str) -> Result<Url, IssuerError> {
        let mut url = Url::parse(base)
            .map_err(|e| IssuerError::Lookup(format!("invalid admin URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| IssuerError::Lookup("admin URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("users")
            .push(subject);
        Ok(url)
    }
}

#[async_trait]
impl IdentityIssuer for JwtIdentityIssuer {
    async fn verify(&self, credential: &str) -> Result<IdentityAssertion, IssuerError> {
        validate_token(credential, &self.config)?.into_assertion()
    }

    async fn lookup_subject(&self, subject: &str) -> Result<Option<IdentityAssertion>, IssuerError> {
        let Some(base) = self.config.admin_url.as_deref() else {
            return Ok(None);
        };

        let url = self.user_url(base, subject)?;
        tracing::debug!(subject = %subject, "looking up subject at issuer");

        let mut request = self.http_client.get(url).header("Accept", "application/json");
        if let Some(key) = &self.config.service_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(IssuerError::Lookup(format!(
                "issuer returned {}",
                response.status()
            )));
        }

        let user: IssuerUser = response
            .json()
            .await
            .map_err(|e| IssuerError::Lookup(format!("failed to parse user response: {}", e)))?;

        Ok(Some(IdentityAssertion {
            subject: subject.to_string(),
            email: non_empty(user.email),
            name: non_empty(user.name),
            avatar_url: non_empty(user.picture),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-issuer-secret-at-least-32-bytes";

    #[test]
    fn test_create_and_validate_token() {
        let mut claims = IssuerClaims::new("sub-42", Some("bob@x.com"), Duration::hours(1));
        claims.name = Some("Bob".to_string());

        let token = create_token(&claims, SECRET).unwrap();
        let validated = validate_token(&token, &JwtIssuerConfig::new(SECRET)).unwrap();

        assert_eq!(validated.sub, "sub-42");
        assert_eq!(validated.email.as_deref(), Some("bob@x.com"));
        assert_eq!(validated.name.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let claims = IssuerClaims::new("sub-42", None, Duration::hours(1));
        let token = create_token(&claims, SECRET).unwrap();

        let config = JwtIssuerConfig::new("another-secret-also-32-bytes-long");
        let err = validate_token(&token, &config).unwrap_err();
        assert!(matches!(err, IssuerError::Invalid(_)));
        assert!(err.is_credential_error());
    }

    #[test]
    fn test_expired_token() {
        let claims = IssuerClaims::new("sub-42", None, Duration::hours(-2));
        let token = create_token(&claims, SECRET).unwrap();

        let err = validate_token(&token, &JwtIssuerConfig::new(SECRET)).unwrap_err();
        assert!(matches!(err, IssuerError::Expired));
    }

    #[test]
    fn test_issuer_and_audience_checked_when_configured() {
        let mut claims = IssuerClaims::new("sub-42", None, Duration::hours(1));
        claims.iss = Some("https://id.example.com/".to_string());
        claims.aud = Some("taskline".to_string());
        let token = create_token(&claims, SECRET).unwrap();

        // Unconfigured: accepted even though iss/aud are present
        assert!(validate_token(&token, &JwtIssuerConfig::new(SECRET)).is_ok());

        let mut config = JwtIssuerConfig::new(SECRET);
        config.issuer = Some("https://id.example.com/".to_string());
        config.audience = Some("taskline".to_string());
        assert!(validate_token(&token, &config).is_ok());

        config.audience = Some("someone-else".to_string());
        assert!(matches!(
            validate_token(&token, &config),
            Err(IssuerError::Invalid(_))
        ));
    }

    #[test]
    fn test_into_assertion_drops_empty_fields() {
        let mut claims = IssuerClaims::new("sub-42", Some("  "), Duration::hours(1));
        claims.picture = Some("https://img.example.com/bob.png".to_string());

        let assertion = claims.into_assertion().unwrap();
        assert_eq!(assertion.subject, "sub-42");
        assert_eq!(assertion.email, None);
        assert_eq!(
            assertion.avatar_url.as_deref(),
            Some("https://img.example.com/bob.png")
        );
    }

    #[test]
    fn test_into_assertion_requires_subject() {
        let claims = IssuerClaims::new("", Some("bob@x.com"), Duration::hours(1));
        assert!(matches!(
            claims.into_assertion(),
            Err(IssuerError::MissingSubject)
        ));
    }

    #[test]
    fn test_user_url_escapes_subject() {
        let issuer = JwtIdentityIssuer::new(JwtIssuerConfig::new(SECRET));
        let url = issuer
            .user_url("https://id.example.com/admin/", "abc/def")
            .unwrap();

        assert_eq!(url.as_str(), "https://id.example.com/admin/users/abc%2Fdef");
    }

    #[tokio::test]
    async fn test_lookup_disabled_without_admin_url() {
        let issuer = JwtIdentityIssuer::new(JwtIssuerConfig::new(SECRET));
        assert!(issuer.lookup_subject("sub-42").await.unwrap().is_none());
    }
}
