// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin REST surface for limit management.
//!
//! Every mutation persists the new config first, then publishes the new
//! snapshot to the guard atomically. Reads never block admissions.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatehouse_admission::LimitSettings;
use gatehouse_core::{
    LimitOverride, LimitScope, LimitSet, UsageSnapshot, UserId, Violation,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::handlers::ErrorResponse;
use crate::server::GatewayState;

/// Partial update for the global limits. Absent fields are unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct LimitsPatch {
    pub burst: Option<u32>,
    pub per_chat: Option<u32>,
    pub hourly: Option<u32>,
    pub daily: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LimitsResponse {
    pub limits: LimitSet,
    pub version: u64,
}

#[derive(Debug, Deserialize)]
pub struct ViolationQuery {
    #[serde(default = "default_list_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    /// Filter by scope name (`burst`, `per_chat`, `hourly`, `daily`).
    #[serde(default)]
    pub level: Option<String>,
}

fn default_list_limit() -> u32 {
    50
}

#[derive(Debug, Serialize)]
pub struct ViolationListResponse {
    pub violations: Vec<Violation>,
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn unavailable(message: impl Into<String>) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Apply a patch to the global limits. Every supplied value must be
/// positive.
fn apply_patch(settings: &LimitSettings, patch: &LimitsPatch) -> Result<LimitSettings, String> {
    for (name, value) in [
        ("burst", patch.burst),
        ("per_chat", patch.per_chat),
        ("hourly", patch.hourly),
        ("daily", patch.daily),
    ] {
        if value == Some(0) {
            return Err(format!("limit `{name}` must be positive"));
        }
    }
    let mut next = settings.clone();
    next.global = LimitSet {
        burst: patch.burst.unwrap_or(settings.global.burst),
        per_chat: patch.per_chat.unwrap_or(settings.global.per_chat),
        hourly: patch.hourly.unwrap_or(settings.global.hourly),
        daily: patch.daily.unwrap_or(settings.global.daily),
    };
    next.version = settings.version + 1;
    Ok(next)
}

/// Persist first, publish second: a failed save leaves the running
/// snapshot untouched.
async fn commit_settings(state: &GatewayState, next: LimitSettings) -> Result<(), Response> {
    if let Err(e) = state.limit_store.save_limits(&next.to_stored()).await {
        error!(error = %e, "failed to persist limit config");
        return Err(unavailable("failed to persist limit config"));
    }
    info!(version = next.version, "limit config updated");
    state.settings.publish(next);
    Ok(())
}

/// GET /admin/limits
pub async fn get_limits(State(state): State<GatewayState>) -> Json<LimitsResponse> {
    let settings = state.settings.current();
    Json(LimitsResponse {
        limits: settings.global,
        version: settings.version,
    })
}

/// PUT /admin/limits
pub async fn put_limits(
    State(state): State<GatewayState>,
    Json(patch): Json<LimitsPatch>,
) -> Response {
    let current = state.settings.current();
    let next = match apply_patch(&current, &patch) {
        Ok(next) => next,
        Err(msg) => return bad_request(msg),
    };
    let response = LimitsResponse {
        limits: next.global,
        version: next.version,
    };
    if let Err(resp) = commit_settings(&state, next).await {
        return resp;
    }
    Json(response).into_response()
}

/// PUT /admin/users/{user_id}/limits
pub async fn put_user_limits(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
    Json(overrides): Json<LimitOverride>,
) -> Response {
    for (name, value) in [
        ("burst", overrides.burst),
        ("per_chat", overrides.per_chat),
        ("hourly", overrides.hourly),
        ("daily", overrides.daily),
    ] {
        if value == Some(0) {
            return bad_request(format!("limit `{name}` must be positive"));
        }
    }

    let mut next = (*state.settings.current()).clone();
    if overrides == LimitOverride::default() {
        next.overrides.remove(&user_id);
    } else {
        next.overrides.insert(user_id.clone(), overrides);
    }
    next.version += 1;

    let effective = next.effective_limits(&UserId(user_id));
    let version = next.version;
    if let Err(resp) = commit_settings(&state, next).await {
        return resp;
    }
    Json(LimitsResponse {
        limits: effective,
        version,
    })
    .into_response()
}

/// POST /admin/users/{user_id}/whitelist
pub async fn post_whitelist(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> Response {
    let mut next = (*state.settings.current()).clone();
    next.whitelist.insert(user_id);
    next.version += 1;
    if let Err(resp) = commit_settings(&state, next).await {
        return resp;
    }
    StatusCode::NO_CONTENT.into_response()
}

/// DELETE /admin/users/{user_id}/whitelist
pub async fn delete_whitelist(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> Response {
    let mut next = (*state.settings.current()).clone();
    if !next.whitelist.remove(&user_id) {
        return bad_request(format!("user `{user_id}` is not whitelisted"));
    }
    next.version += 1;
    if let Err(resp) = commit_settings(&state, next).await {
        return resp;
    }
    StatusCode::NO_CONTENT.into_response()
}

/// POST /admin/users/{user_id}/reset
pub async fn post_reset(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.guard.reset(&UserId(user_id.clone())).await {
        Ok(()) => {
            info!(user = %user_id, "window counters reset");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            error!(user = %user_id, error = %e, "counter reset failed");
            unavailable("counter store unavailable")
        }
    }
}

/// GET /admin/users/{user_id}/usage
pub async fn get_user_usage(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
) -> Response {
    match state.guard.usage(&UserId(user_id), None).await {
        Ok(snapshot) => Json::<UsageSnapshot>(snapshot).into_response(),
        Err(e) => {
            error!(error = %e, "usage lookup failed");
            unavailable("counter store unavailable")
        }
    }
}

/// GET /admin/violations?limit&offset&level
pub async fn get_violations(
    State(state): State<GatewayState>,
    Query(query): Query<ViolationQuery>,
) -> Response {
    let scope = match query.level.as_deref() {
        Some(level) => match LimitScope::from_str(level) {
            Ok(scope) => Some(scope),
            Err(_) => return bad_request(format!("unknown level `{level}`")),
        },
        None => None,
    };
    let limit = query.limit.min(500);

    match state.violations.list(None, scope, limit, query.offset).await {
        Ok(violations) => Json(ViolationListResponse { violations }).into_response(),
        Err(e) => {
            error!(error = %e, "violation listing failed");
            unavailable("violation store unavailable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn settings() -> LimitSettings {
        LimitSettings {
            global: LimitSet {
                burst: 10,
                per_chat: 50,
                hourly: 150,
                daily: 1000,
            },
            overrides: HashMap::new(),
            whitelist: HashSet::new(),
            version: 7,
        }
    }

    #[test]
    fn patch_updates_only_supplied_fields() {
        let patch = LimitsPatch {
            burst: Some(20),
            ..Default::default()
        };
        let next = apply_patch(&settings(), &patch).unwrap();
        assert_eq!(next.global.burst, 20);
        assert_eq!(next.global.daily, 1000);
        assert_eq!(next.version, 8);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let patch = LimitsPatch {
            hourly: Some(0),
            ..Default::default()
        };
        let err = apply_patch(&settings(), &patch).unwrap_err();
        assert!(err.contains("hourly"));
    }

    #[test]
    fn empty_patch_bumps_only_the_version() {
        let next = apply_patch(&settings(), &LimitsPatch::default()).unwrap();
        assert_eq!(next.global, settings().global);
        assert_eq!(next.version, 8);
    }

    #[test]
    fn violation_query_defaults() {
        let query: ViolationQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
        assert!(query.level.is_none());
    }
}
