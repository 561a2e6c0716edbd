// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::StoreError;

/// A registered user together with their current (encrypted) API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub encrypted_credential: Option<String>,
    pub credential_created_at: DateTime<Utc>,
    pub credential_expires_at: Option<DateTime<Utc>>,
    pub credential_revoked: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Replacement credential written on rotation. Clears the revoked flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFields {
    pub encrypted_credential: String,
    pub credential_created_at: DateTime<Utc>,
    pub credential_expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    /// Exact match.
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError>;

    /// Case-insensitive match.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Fails with [`StoreError::UniqueViolation`] when the username or email
    /// is already taken at commit time.
    async fn insert(&self, identity: Identity) -> Result<Identity, StoreError>;

    /// Writes `fields` only while the stored ciphertext still equals
    /// `previous`, then returns the row as it stands. `None` when the
    /// identity no longer exists.
    async fn update_credential_fields(
        &self,
        id: Uuid,
        previous: Option<&str>,
        fields: CredentialFields,
    ) -> Result<Option<Identity>, StoreError>;

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// `false` when the identity does not exist.
    async fn revoke_credential(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: RwLock<HashMap<Uuid, Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        Ok(self.identities.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        let identities = self.identities.read().await;
        Ok(identities
            .values()
            .find(|identity| identity.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let identities = self.identities.read().await;
        Ok(identities
            .values()
            .find(|identity| identity.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    #[tracing::instrument(skip_all, fields(id = %identity.id))]
    async fn insert(&self, identity: Identity) -> Result<Identity, StoreError> {
        let mut identities = self.identities.write().await;

        if identities.contains_key(&identity.id) {
            return Err(StoreError::UniqueViolation("id"));
        }
        for existing in identities.values() {
            if existing.username == identity.username {
                return Err(StoreError::UniqueViolation("username"));
            }
            if existing.email.eq_ignore_ascii_case(&identity.email) {
                return Err(StoreError::UniqueViolation("email"));
            }
        }

        identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn update_credential_fields(
        &self,
        id: Uuid,
        previous: Option<&str>,
        fields: CredentialFields,
    ) -> Result<Option<Identity>, StoreError> {
        let mut identities = self.identities.write().await;
        let Some(identity) = identities.get_mut(&id) else {
            return Ok(None);
        };
        if identity.encrypted_credential.as_deref() != previous {
            return Ok(Some(identity.clone()));
        }

        identity.encrypted_credential = Some(fields.encrypted_credential);
        identity.credential_created_at = fields.credential_created_at;
        identity.credential_expires_at = Some(fields.credential_expires_at);
        identity.credential_revoked = false;

        Ok(Some(identity.clone()))
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(identity) = self.identities.write().await.get_mut(&id) {
            identity.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn revoke_credential(&self, id: Uuid) -> Result<bool, StoreError> {
        match self.identities.write().await.get_mut(&id) {
            Some(identity) => {
                identity.credential_revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
