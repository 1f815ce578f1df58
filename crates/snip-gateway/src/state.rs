use crate::error::AppError;
use crate::subnet::TrustedSubnet;
use axum::extract::FromRequestParts;
use axum::http::header::HeaderName;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use snip_core::{OwnerId, ShortCode, Shortener};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::warn;

/// Header carrying the authenticated owner id, set by the fronting proxy.
pub const DEFAULT_OWNER_HEADER: &str = "x-owner-id";

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    base_url: String,
    owner_header: HeaderName,
    trusted_subnet: Option<TrustedSubnet>,
}

impl AppState {
    pub fn new(shortener: Arc<dyn Shortener>, public_base_url: impl Into<String>) -> Self {
        Self {
            shortener,
            base_url: public_base_url.into(),
            owner_header: HeaderName::from_static(DEFAULT_OWNER_HEADER),
            trusted_subnet: None,
        }
    }

    pub fn with_owner_header(mut self, header: HeaderName) -> Self {
        self.owner_header = header;
        self
    }

    /// Opens the internal endpoints to clients inside `subnet`.
    pub fn with_trusted_subnet(mut self, subnet: TrustedSubnet) -> Self {
        self.trusted_subnet = Some(subnet);
        self
    }

    pub fn shortener(&self) -> &Arc<dyn Shortener> {
        &self.shortener
    }

    pub fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }
}

/// The owner of the current request.
///
/// Rejects with 401 when the owner header is missing, blank or not UTF-8.
pub struct Owner(pub OwnerId);

impl FromRequestParts<AppState> for Owner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(&state.owner_header)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        OwnerId::new(value)
            .map(Owner)
            .map_err(|_| AppError::Unauthorized)
    }
}

/// A client whose address lies inside the trusted subnet.
///
/// The address comes from `X-Real-IP`, falling back to the first entry of
/// `X-Forwarded-For`. Rejects with 403 when no subnet is configured.
pub struct TrustedClient(pub IpAddr);

impl FromRequestParts<AppState> for TrustedClient {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(subnet) = state.trusted_subnet else {
            warn!("no trusted subnet configured, refusing internal request");
            return Err(AppError::Forbidden);
        };

        match client_ip(&parts.headers) {
            Some(ip) if subnet.contains(ip) => Ok(TrustedClient(ip)),
            ip => {
                warn!(client_ip = ?ip, trusted_subnet = %subnet, "untrusted client on internal endpoint");
                Err(AppError::Forbidden)
            }
        }
    }
}

fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    header("x-real-ip")
        .and_then(|value| value.trim().parse().ok())
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|value| value.split(',').next())
                .and_then(|value| value.trim().parse().ok())
        })
}
