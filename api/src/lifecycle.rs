// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Issue, verify, rotate and revoke API keys.
//!
//! Plaintext keys only ever exist in memory as [`ApiKey`] values: the store
//! holds ciphertext, and a key is handed back exactly once per signin.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use intake_vault::{ApiKey, Vault, VaultError};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::clock::Clock;
use crate::errors::StoreError;
use crate::identity::{CredentialFields, Identity, IdentityStore};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AuthError {
    #[error("{0} already exists")]
    DuplicateIdentity(&'static str),
    #[error("unknown identity")]
    UnknownIdentity,
    #[error("password mismatch")]
    BadCredential,
    #[error("invalid api key")]
    InvalidCredential,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(source: tokio::task::JoinError) -> Self {
        AuthError::Internal(source.to_string())
    }
}

/// Result of a successful signin.
#[derive(Debug)]
pub struct SignedIn {
    pub identity: Identity,
    pub api_key: ApiKey,
    /// `false` when the stored key was still valid and has been returned as is
    pub rotated: bool,
}

pub struct CredentialManager {
    store: Arc<dyn IdentityStore>,
    vault: Arc<Vault>,
    clock: Arc<dyn Clock>,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn IdentityStore>, vault: Arc<Vault>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            vault,
            clock,
        }
    }

    /// Registers a new identity with a freshly generated, sealed API key.
    #[tracing::instrument(skip(self, email, password))]
    pub async fn issue(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        if self.store.find_by_username(username).await?.is_some() {
            return Err(AuthError::DuplicateIdentity("username"));
        }
        if self.store.find_by_email(email).await?.is_some() {
            return Err(AuthError::DuplicateIdentity("email"));
        }

        let password_hash = self.hash_password(password).await?;
        let now = self.clock.now();
        let api_key = self.vault.generate_credential()?;

        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash,
            encrypted_credential: Some(self.vault.encrypt(&api_key)?),
            credential_created_at: now,
            credential_expires_at: Some(self.vault.expiration_from(now, None)),
            credential_revoked: false,
            is_active: true,
            created_at: now,
            last_login_at: None,
        };

        // a concurrent signup can still win between the lookups and here
        let identity = self.store.insert(identity).await.map_err(|e| match e {
            StoreError::UniqueViolation(field) => AuthError::DuplicateIdentity(field),
            other => AuthError::Store(other),
        })?;

        tracing::info!("[api] issued credential for {}", identity.id);
        Ok(identity)
    }

    /// Checks the password and returns a usable API key, rotating the stored
    /// one when it is missing, revoked, expired or unreadable.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate_and_refresh(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SignedIn, AuthError> {
        let identity = self
            .store
            .find_by_username(username)
            .await?
            .filter(|identity| identity.is_active)
            .ok_or(AuthError::UnknownIdentity)?;

        if !self
            .verify_password(password, &identity.password_hash)
            .await?
        {
            return Err(AuthError::BadCredential);
        }

        let now = self.clock.now();
        if let Err(e) = self.store.update_last_login(identity.id, now).await {
            tracing::warn!("[api] unable to record login for {}: {}", identity.id, e);
        }

        if let Some(api_key) = self.reusable_credential(&identity, now) {
            return Ok(SignedIn {
                identity,
                api_key,
                rotated: false,
            });
        }

        let mut identity = identity;
        loop {
            let api_key = self.vault.generate_credential()?;
            let sealed = self.vault.encrypt(&api_key)?;
            let fields = CredentialFields {
                encrypted_credential: sealed.clone(),
                credential_created_at: now,
                credential_expires_at: self.vault.expiration_from(now, None),
            };
            let current = self
                .store
                .update_credential_fields(
                    identity.id,
                    identity.encrypted_credential.as_deref(),
                    fields,
                )
                .await?
                .ok_or(AuthError::UnknownIdentity)?;

            if current.encrypted_credential.as_deref() == Some(sealed.as_str()) {
                tracing::info!("[api] rotated credential for {}", current.id);
                return Ok(SignedIn {
                    identity: current,
                    api_key,
                    rotated: true,
                });
            }

            // a concurrent signin replaced the key first; hand out the survivor
            if let Some(api_key) = self.reusable_credential(&current, now) {
                return Ok(SignedIn {
                    identity: current,
                    api_key,
                    rotated: true,
                });
            }
            identity = current;
        }
    }

    /// Resolves the caller of a protected request. Never rotates.
    #[tracing::instrument(skip(self, supplied))]
    pub async fn verify(&self, user_id: &str, supplied: &str) -> Result<Identity, AuthError> {
        let id = Uuid::parse_str(user_id).map_err(|_| AuthError::UnknownIdentity)?;
        let identity = self
            .store
            .find_by_id(id)
            .await?
            .filter(|identity| identity.is_active)
            .ok_or(AuthError::UnknownIdentity)?;

        if identity.credential_revoked {
            return Err(AuthError::InvalidCredential);
        }
        match identity.credential_expires_at {
            Some(expires) if expires > self.clock.now() => {}
            _ => return Err(AuthError::InvalidCredential),
        }

        let ciphertext = identity
            .encrypted_credential
            .as_deref()
            .ok_or(AuthError::InvalidCredential)?;
        let stored = self.vault.decrypt(ciphertext).map_err(|e| {
            tracing::warn!("[api] stored credential for {} is unreadable: {}", id, e);
            AuthError::InvalidCredential
        })?;

        if !stored.matches(supplied) {
            return Err(AuthError::InvalidCredential);
        }
        Ok(identity)
    }

    /// Invalidates the current key. The next signin issues a new one.
    #[tracing::instrument(skip(self))]
    pub async fn revoke(&self, id: Uuid) -> Result<(), AuthError> {
        if !self.store.revoke_credential(id).await? {
            return Err(AuthError::UnknownIdentity);
        }
        tracing::info!("[api] revoked credential for {}", id);
        Ok(())
    }

    fn reusable_credential(&self, identity: &Identity, now: DateTime<Utc>) -> Option<ApiKey> {
        if identity.credential_revoked {
            return None;
        }
        if identity.credential_expires_at.is_none_or(|expires| expires <= now) {
            return None;
        }
        let ciphertext = identity.encrypted_credential.as_deref()?;
        match self.vault.decrypt(ciphertext) {
            Ok(api_key) => Some(api_key),
            Err(e) => {
                tracing::warn!(
                    "[api] stored credential for {} is unreadable, rotating: {}",
                    identity.id,
                    e
                );
                None
            }
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let vault = self.vault.clone();
        let password = Zeroizing::new(password.to_string());
        let digest =
            tokio::task::spawn_blocking(move || vault.hash_password(&password)).await??;
        Ok(digest)
    }

    async fn verify_password(&self, password: &str, digest: &str) -> Result<bool, AuthError> {
        let vault = self.vault.clone();
        let password = Zeroizing::new(password.to_string());
        let digest = digest.to_string();
        let matched =
            tokio::task::spawn_blocking(move || vault.verify_password(&password, &digest))
                .await??;
        Ok(matched)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU32;
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::identity::MemoryIdentityStore;
    use intake_vault::{CredentialKey, VaultPolicy};

    struct Fixture {
        manager: CredentialManager,
        store: Arc<MemoryIdentityStore>,
        clock: Arc<ManualClock>,
    }

    fn vault(key: &CredentialKey) -> Arc<Vault> {
        let policy = VaultPolicy {
            password_iterations: NonZeroU32::new(1_000).unwrap(),
            credential_expire_days: 3,
        };
        Arc::new(Vault::new(key, policy).unwrap())
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryIdentityStore::new());
        let clock = Arc::new(ManualClock::default());
        let key = CredentialKey::generate().unwrap();
        let manager = CredentialManager::new(store.clone(), vault(&key), clock.clone());
        Fixture {
            manager,
            store,
            clock,
        }
    }

    async fn signup(fixture: &Fixture) -> Identity {
        fixture
            .manager
            .issue("alice@example.com", "alice", "correct horse")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_issue_stores_only_ciphertext() {
        let fixture = fixture();
        let identity = signup(&fixture).await;

        assert!(identity.is_active);
        assert!(!identity.credential_revoked);
        assert!(identity.password_hash.starts_with("$pbkdf2-sha256$1000$"));
        assert!(!identity.password_hash.contains("correct horse"));
        assert_eq!(
            identity.credential_expires_at,
            Some(fixture.clock.now() + chrono::TimeDelta::days(3))
        );
        let ciphertext = identity.encrypted_credential.unwrap();
        assert!(!ciphertext.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_identity() {
        let fixture = fixture();
        signup(&fixture).await;

        let result = fixture
            .manager
            .issue("other@example.com", "alice", "correct horse")
            .await;
        assert_eq!(result.unwrap_err(), AuthError::DuplicateIdentity("username"));

        let result = fixture
            .manager
            .issue("ALICE@example.com", "alice2", "correct horse")
            .await;
        assert_eq!(result.unwrap_err(), AuthError::DuplicateIdentity("email"));
    }

    #[tokio::test]
    async fn test_concurrent_signups_produce_one_identity() {
        let fixture = Arc::new(fixture());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let fixture = fixture.clone();
                tokio::spawn(async move {
                    fixture
                        .manager
                        .issue(&format!("alice{i}@example.com"), "alice", "correct horse")
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert_eq!(e, AuthError::DuplicateIdentity("username")),
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_signin_reuses_valid_credential() {
        let fixture = fixture();
        signup(&fixture).await;

        let first = fixture
            .manager
            .authenticate_and_refresh("alice", "correct horse")
            .await
            .unwrap();
        assert!(!first.rotated);
        assert_eq!(first.api_key.expose().len(), 64);

        let second = fixture
            .manager
            .authenticate_and_refresh("alice", "correct horse")
            .await
            .unwrap();
        assert!(!second.rotated);
        assert_eq!(first.api_key, second.api_key);

        let stored = fixture.store.find_by_id(first.identity.id).await.unwrap().unwrap();
        assert_eq!(stored.last_login_at, Some(fixture.clock.now()));
    }

    #[tokio::test]
    async fn test_signin_rotates_expired_credential() {
        let fixture = fixture();
        signup(&fixture).await;
        let before = fixture
            .manager
            .authenticate_and_refresh("alice", "correct horse")
            .await
            .unwrap();

        fixture.clock.advance(Duration::from_secs(3 * 24 * 3600));
        let after = fixture
            .manager
            .authenticate_and_refresh("alice", "correct horse")
            .await
            .unwrap();

        assert!(after.rotated);
        assert_ne!(before.api_key, after.api_key);
        assert_eq!(
            after.identity.credential_expires_at,
            Some(fixture.clock.now() + chrono::TimeDelta::days(3))
        );

        let id = after.identity.id.to_string();
        assert_eq!(
            fixture.manager.verify(&id, before.api_key.expose()).await,
            Err(AuthError::InvalidCredential)
        );
        fixture
            .manager
            .verify(&id, after.api_key.expose())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotations_agree_on_one_key() {
        let fixture = Arc::new(fixture());
        signup(&fixture).await;
        fixture.clock.advance(Duration::from_secs(3 * 24 * 3600));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fixture = fixture.clone();
                tokio::spawn(async move {
                    fixture
                        .manager
                        .authenticate_and_refresh("alice", "correct horse")
                        .await
                })
            })
            .collect();

        let mut keys = Vec::new();
        for handle in handles {
            let signed_in = handle.await.unwrap().unwrap();
            assert!(signed_in.rotated);
            keys.push(signed_in.api_key);
        }

        // every caller holds the key that survived
        let id = fixture
            .store
            .find_by_username("alice")
            .await
            .unwrap()
            .unwrap()
            .id
            .to_string();
        for key in &keys {
            assert_eq!(key, &keys[0]);
            fixture.manager.verify(&id, key.expose()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_signin_rotates_unreadable_credential() {
        let fixture = fixture();
        let identity = signup(&fixture).await;

        // sealed under some other process key
        let other = vault(&CredentialKey::generate().unwrap());
        let foreign = other.encrypt(&other.generate_credential().unwrap()).unwrap();
        let now = fixture.clock.now();
        fixture
            .store
            .update_credential_fields(
                identity.id,
                identity.encrypted_credential.as_deref(),
                CredentialFields {
                    encrypted_credential: foreign,
                    credential_created_at: now,
                    credential_expires_at: now + chrono::TimeDelta::days(3),
                },
            )
            .await
            .unwrap();

        let signed_in = fixture
            .manager
            .authenticate_and_refresh("alice", "correct horse")
            .await
            .unwrap();
        assert!(signed_in.rotated);
    }

    #[tokio::test]
    async fn test_revoked_credential_rotates_on_signin() {
        let fixture = fixture();
        signup(&fixture).await;
        let before = fixture
            .manager
            .authenticate_and_refresh("alice", "correct horse")
            .await
            .unwrap();
        let id = before.identity.id;

        fixture.manager.revoke(id).await.unwrap();
        assert_eq!(
            fixture
                .manager
                .verify(&id.to_string(), before.api_key.expose())
                .await,
            Err(AuthError::InvalidCredential)
        );

        let after = fixture
            .manager
            .authenticate_and_refresh("alice", "correct horse")
            .await
            .unwrap();
        assert!(after.rotated);
        assert!(!after.identity.credential_revoked);
        assert_ne!(before.api_key, after.api_key);

        assert_eq!(
            fixture.manager.revoke(Uuid::new_v4()).await,
            Err(AuthError::UnknownIdentity)
        );
    }

    #[tokio::test]
    async fn test_signin_failures() {
        let fixture = fixture();
        signup(&fixture).await;

        assert_eq!(
            fixture
                .manager
                .authenticate_and_refresh("bob", "correct horse")
                .await
                .unwrap_err(),
            AuthError::UnknownIdentity
        );
        assert_eq!(
            fixture
                .manager
                .authenticate_and_refresh("alice", "wrong horse")
                .await
                .unwrap_err(),
            AuthError::BadCredential
        );
    }

    #[tokio::test]
    async fn test_verify_rejections() {
        let fixture = fixture();
        signup(&fixture).await;
        let signed_in = fixture
            .manager
            .authenticate_and_refresh("alice", "correct horse")
            .await
            .unwrap();
        let key = signed_in.api_key.expose();

        assert_eq!(
            fixture.manager.verify("not-a-uuid", key).await,
            Err(AuthError::UnknownIdentity)
        );
        assert_eq!(
            fixture
                .manager
                .verify(&Uuid::new_v4().to_string(), key)
                .await,
            Err(AuthError::UnknownIdentity)
        );
        let id = signed_in.identity.id.to_string();
        assert_eq!(
            fixture.manager.verify(&id, "0".repeat(64).as_str()).await,
            Err(AuthError::InvalidCredential)
        );
        assert_eq!(
            fixture.manager.verify(&id, "").await,
            Err(AuthError::InvalidCredential)
        );
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let fixture = fixture();
        let identity = signup(&fixture).await;

        let signed_in = fixture
            .manager
            .authenticate_and_refresh("alice", "correct horse")
            .await
            .unwrap();
        assert_eq!(signed_in.identity.id, identity.id);

        let id = identity.id.to_string();
        let verified = fixture
            .manager
            .verify(&id, signed_in.api_key.expose())
            .await
            .unwrap();
        assert_eq!(verified.username, "alice");

        let mut wrong = signed_in.api_key.expose().to_string();
        wrong.replace_range(..1, if wrong.starts_with('a') { "b" } else { "a" });
        assert_eq!(
            fixture.manager.verify(&id, &wrong).await,
            Err(AuthError::InvalidCredential)
        );

        assert_eq!(
            fixture
                .manager
                .issue("alice@example.com", "alice", "another one")
                .await
                .unwrap_err(),
            AuthError::DuplicateIdentity("username")
        );
    }
}
