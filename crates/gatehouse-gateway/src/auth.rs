// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token middleware for the admin REST surface.
//!
//! When no admin token is configured, every admin request is rejected
//! (fail-closed). The WebSocket handshake authenticates separately via the
//! credential validator.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Admin auth configuration.
#[derive(Clone)]
pub struct AdminAuth {
    /// Expected bearer token. `None` disables the admin surface.
    pub token: Option<String>,
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth")
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Validates `Authorization: Bearer <token>` against the configured admin
/// token. No configured token means no admin access.
pub async fn admin_middleware(
    State(auth): State<AdminAuth>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(ref expected) = auth.token else {
        tracing::warn!("admin request rejected: no admin token configured");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let presented = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_token() {
        let auth = AdminAuth {
            token: Some("super-secret".into()),
        };
        let debug = format!("{auth:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn missing_token_means_disabled() {
        let auth = AdminAuth { token: None };
        assert!(auth.token.is_none());
    }
}
