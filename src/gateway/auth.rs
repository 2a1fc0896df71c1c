//! Shared-secret access gate
//!
//! The gate makes a binary admission decision from a single request header.
//! It holds only its startup configuration, so it is shared behind an `Arc`
//! without locking.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::router::ApiError;
use crate::config::AuthConfig;
use crate::{Error, Result};

/// The presented credential was missing or wrong while the gate is enabled.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("missing or invalid API key")]
pub struct Unauthorized;

/// Admission check in front of the item routes
#[derive(Debug)]
pub struct AccessGate {
    enabled: bool,
    secret: String,
    header: HeaderName,
    /// Header name as configured, for status reports
    header_name: String,
}

impl AccessGate {
    /// Build a gate. An enabled gate needs a non-blank secret.
    pub fn new(enabled: bool, secret: impl Into<String>, header_name: &str) -> Result<Self> {
        let secret = secret.into();
        if enabled && secret.trim().is_empty() {
            return Err(Error::Config("auth.api_key must not be empty".into()));
        }

        let header = HeaderName::from_bytes(header_name.trim().as_bytes())
            .map_err(|e| Error::Config(format!("Invalid auth.header_name '{header_name}': {e}")))?;

        Ok(Self {
            enabled,
            secret,
            header,
            header_name: header_name.trim().to_string(),
        })
    }

    /// A gate that admits everything
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            secret: String::new(),
            header: HeaderName::from_static("x-api-key"),
            header_name: crate::config::DEFAULT_HEADER_NAME.to_string(),
        }
    }

    /// Create the gate from `AuthConfig`, resolving the key
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        if !config.enabled {
            return Self::new(false, String::new(), &config.header_name);
        }

        let Some(secret) = config.resolve_api_key()? else {
            return Err(Error::Config(
                "auth.enabled requires auth.api_key (literal, env:VAR or auto)".into(),
            ));
        };

        if config.api_key.as_deref() == Some("auto") {
            info!("Auto-generated API key: {}", secret);
        }

        Self::new(true, secret, &config.header_name)
    }

    /// Whether the secret is enforced
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Header the credential is read from
    #[must_use]
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Header name as configured (original casing)
    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Admit or reject a presented credential.
    ///
    /// Disabled: always admits. Enabled: admits only an exact match of the
    /// secret, compared in constant time.
    pub fn authorize(&self, presented: Option<&str>) -> std::result::Result<(), Unauthorized> {
        self.authorize_bytes(presented.map(str::as_bytes))
    }

    /// Same as [`authorize`](Self::authorize) for a raw header value, which
    /// may carry bytes outside visible ASCII (e.g. a UTF-8 secret).
    pub fn authorize_bytes(
        &self,
        presented: Option<&[u8]>,
    ) -> std::result::Result<(), Unauthorized> {
        if !self.enabled {
            return Ok(());
        }

        let matches = presented.is_some_and(|p| p.ct_eq(self.secret.as_bytes()).into());

        if matches { Ok(()) } else { Err(Unauthorized) }
    }
}

/// Gate middleware for the item routes
pub async fn gate_middleware(
    State(gate): State<Arc<AccessGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(gate.header())
        .map(HeaderValue::as_bytes);

    let decision = gate.authorize_bytes(presented);

    match decision {
        Ok(()) => {
            debug!(path = %request.uri().path(), "Request admitted");
            next.run(request).await
        }
        Err(e) => {
            warn!(
                path = %request.uri().path(),
                header = %gate.header_name(),
                "Rejected request without a valid API key"
            );
            ApiError::from(e).into_response()
        }
    }
}
