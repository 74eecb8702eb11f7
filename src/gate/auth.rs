//! Authentication material and credential verification.
//!
//! Two kinds of routes count as authentication attempts: paths behind the
//! basic-auth wall, and POSTs to the login form.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, Method};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;

use crate::config::AuthConfig;
use crate::security::Payload;
use crate::store::StoreResult;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a request offers for authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    /// The route is not guarded.
    NotRequired,
    /// Guarded route, nothing offered.
    Missing,
    /// Guarded route, something offered that cannot be parsed.
    Malformed,
    Attempt(Credentials),
}

impl Authentication {
    pub fn is_attempt(&self) -> bool {
        !matches!(self, Authentication::NotRequired)
    }
}

/// Checks credentials against some authority.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(false)` means wrong credentials; `Err` means the authority could
    /// not answer.
    async fn verify(&self, credentials: &Credentials) -> StoreResult<bool>;
}

/// A single configured user.
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.username.clone(), config.password.clone())
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentials {
    async fn verify(&self, credentials: &Credentials) -> StoreResult<bool> {
        let user_ok = constant_time_eq(credentials.username.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(credentials.password.as_bytes(), self.password.as_bytes());
        Ok(user_ok & pass_ok)
    }
}

/// Compare without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Which routes are guarded, and how their material is read.
#[derive(Debug, Clone)]
pub struct AuthRoutes {
    basic_auth_paths: Vec<String>,
    login_path: String,
}

impl AuthRoutes {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            basic_auth_paths: config.basic_auth_paths.clone(),
            login_path: config.login_path.clone(),
        }
    }

    pub fn is_login(&self, method: &Method, path: &str) -> bool {
        *method == Method::POST && path == self.login_path
    }

    pub fn is_walled(&self, path: &str) -> bool {
        self.basic_auth_paths.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/') || prefix.ends_with('/'))
        })
    }

    /// Extract authentication material for one request.
    pub fn authentication(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        payload: Payload<'_>,
    ) -> Authentication {
        if self.is_login(method, path) {
            return match payload {
                Payload::Complete(body) => parse_login_form(body),
                Payload::Overflowed => Authentication::Malformed,
            };
        }

        if self.is_walled(path) {
            return match headers.get(header::AUTHORIZATION) {
                None => Authentication::Missing,
                Some(value) => value
                    .to_str()
                    .map(parse_basic)
                    .unwrap_or(Authentication::Malformed),
            };
        }

        Authentication::NotRequired
    }
}

/// Parse an `Authorization: Basic ...` header value.
pub fn parse_basic(value: &str) -> Authentication {
    let Some((scheme, encoded)) = value.trim().split_once(' ') else {
        return Authentication::Malformed;
    };
    if !scheme.eq_ignore_ascii_case("basic") {
        return Authentication::Malformed;
    }

    let decoded = match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return Authentication::Malformed,
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return Authentication::Malformed;
    };

    match decoded.split_once(':') {
        Some((username, password)) => Authentication::Attempt(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }),
        None => Authentication::Malformed,
    }
}

/// Parse an urlencoded login form with `email` and `password` fields.
pub fn parse_login_form(body: &[u8]) -> Authentication {
    let mut email = None;
    let mut password = None;
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "email" => email = Some(value.into_owned()),
            "password" => password = Some(value.into_owned()),
            _ => {}
        }
    }

    match (email, password) {
        (Some(username), Some(password)) if !username.is_empty() => {
            Authentication::Attempt(Credentials { username, password })
        }
        _ => Authentication::Malformed,
    }
}
