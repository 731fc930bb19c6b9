// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::GatehouseError;
use crate::types::UserId;

/// Maps a connection credential to a user identity.
///
/// Fail-closed: any error (including transient ones) rejects the
/// handshake. There is no anonymous identity.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<UserId, GatehouseError>;
}
