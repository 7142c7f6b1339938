use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::core::offer::CredentialOfferPayload;

/// Progress of an issuance, recorded on its [CredentialOfferSession].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    /// The offer has been created, waiting on the wallet to redeem it.
    OfferCreated,
    /// The wallet has fetched the offer by its URI.
    OfferUriRetrieved,
    AccessTokenRequested,
    AccessTokenCreated,
    CredentialRequestReceived,
    CredentialIssued,
    Error,
}

/// A Credential Offer and what the issuer remembers about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialOfferSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_authorized_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,
    /// The PIN the wallet must present, when the offer requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pin: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
    pub status: IssueStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub credential_offer: CredentialOfferPayload,
}

impl CredentialOfferSession {
    /// A freshly created offer. The codes are taken from the offer's grants.
    pub fn new(credential_offer: CredentialOfferPayload, user_pin: Option<String>) -> Self {
        Self {
            pre_authorized_code: credential_offer
                .pre_authorized_grant()
                .map(|grant| grant.pre_authorized_code.clone()),
            issuer_state: credential_offer.issuer_state().map(ToOwned::to_owned),
            user_pin,
            created_at: Utc::now(),
            last_updated_at: None,
            status: IssueStatus::OfferCreated,
            error: None,
            credential_offer,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// The key the session is stored under: the pre-authorized code, else the issuer state.
    pub fn key(&self) -> Option<&str> {
        self.pre_authorized_code
            .as_deref()
            .or(self.issuer_state.as_deref())
    }

    pub(crate) fn update_status(&mut self, status: IssueStatus) {
        self.status = status;
        self.last_updated_at = Some(Utc::now());
    }
}

/// A `c_nonce` handed out to a wallet, bound to the offer it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CNonceState {
    pub c_nonce: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_authorized_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,
}

/// Binds an offer URI to its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct URIState {
    pub uri: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_authorized_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,
}

impl CNonceState {
    /// The session key this nonce was issued for.
    pub fn session_key(&self) -> Option<&str> {
        self.pre_authorized_code
            .as_deref()
            .or(self.issuer_state.as_deref())
    }
}

impl URIState {
    pub fn session_key(&self) -> Option<&str> {
        self.pre_authorized_code
            .as_deref()
            .or(self.issuer_state.as_deref())
    }
}

/// A value held in a [StateStore].
pub trait StateEntry: Debug + Clone + Send + Sync + 'static {
    fn created_at(&self) -> DateTime<Utc>;

    /// An entry is expired once strictly more than `max_age` has passed since creation.
    fn is_expired(&self, max_age: TimeDelta, now: DateTime<Utc>) -> bool {
        self.created_at()
            .checked_add_signed(max_age)
            .is_some_and(|deadline| now > deadline)
    }
}

impl StateEntry for CredentialOfferSession {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl StateEntry for CNonceState {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl StateEntry for URIState {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("no state found for key {key}")]
    NotFound { key: String },

    #[error("state store failure: {0:#}")]
    Backend(anyhow::Error),
}

/// Keyed storage for issuer state. One store is used per entry type.
///
/// Operations on distinct keys are independent; the issuer never assumes
/// atomicity across calls.
#[async_trait]
pub trait StateStore<T: StateEntry>: Debug + Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<T>, StateError>;

    /// Insert or replace the entry under `key`.
    async fn set(&self, key: &str, value: T) -> Result<(), StateError>;

    async fn has(&self, key: &str) -> Result<bool, StateError>;

    /// Remove the entry under `key`. Returns whether an entry was present;
    /// deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<bool, StateError>;

    /// Remove every entry older than `max_age`. Returns the number removed.
    async fn clear_expired(&self, max_age: TimeDelta) -> Result<usize, StateError>;

    /// Like [get](Self::get), but a missing entry is an error.
    async fn get_asserted(&self, key: &str) -> Result<T, StateError> {
        self.get(key).await?.ok_or_else(|| StateError::NotFound {
            key: key.to_owned(),
        })
    }
}

/// A local in-memory store. Not for production use!
///
/// # Warning
/// This in-memory store should only be used for test purposes, it will not work for a distributed
/// deployment.
#[derive(Debug, Clone)]
pub struct MemoryStates<T> {
    store: Arc<Mutex<BTreeMap<String, T>>>,
}

impl<T> Default for MemoryStates<T> {
    fn default() -> Self {
        Self {
            store: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl<T> MemoryStates<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.lock().await.is_empty()
    }
}

#[async_trait]
impl<T: StateEntry> StateStore<T> for MemoryStates<T> {
    async fn get(&self, key: &str) -> Result<Option<T>, StateError> {
        Ok(self.store.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: T) -> Result<(), StateError> {
        self.store.lock().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StateError> {
        Ok(self.store.lock().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, StateError> {
        Ok(self.store.lock().await.remove(key).is_some())
    }

    async fn clear_expired(&self, max_age: TimeDelta) -> Result<usize, StateError> {
        let now = Utc::now();
        let mut store = self.store.lock().await;
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired(max_age, now));
        Ok(before - store.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn nonce(c_nonce: &str, created_at: DateTime<Utc>) -> CNonceState {
        CNonceState {
            c_nonce: c_nonce.into(),
            created_at,
            pre_authorized_code: Some("SplxlOBeZQQYbYS6WxSbIA1".into()),
            issuer_state: None,
        }
    }

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemoryStates::new();
        let entry = nonce("tZignsnFbp", Utc::now());

        assert_eq!(store.get("tZignsnFbp").await.unwrap(), None);
        store.set("tZignsnFbp", entry.clone()).await.unwrap();
        assert!(store.has("tZignsnFbp").await.unwrap());
        assert_eq!(store.get("tZignsnFbp").await.unwrap(), Some(entry));

        assert!(store.delete("tZignsnFbp").await.unwrap());
        assert!(!store.delete("tZignsnFbp").await.unwrap());
        assert!(!store.has("tZignsnFbp").await.unwrap());
    }

    #[tokio::test]
    async fn get_asserted_reports_key() {
        let store: MemoryStates<CNonceState> = MemoryStates::new();
        let err = store.get_asserted("missing").await.unwrap_err();
        assert!(matches!(err, StateError::NotFound { ref key } if key == "missing"));
        assert_eq!(err.to_string(), "no state found for key missing");
    }

    #[tokio::test]
    async fn clear_expired_keeps_fresh_entries() {
        let store = MemoryStates::new();
        store
            .set("old", nonce("old", DateTime::UNIX_EPOCH))
            .await
            .unwrap();
        store.set("new", nonce("new", Utc::now())).await.unwrap();

        let removed = store.clear_expired(TimeDelta::seconds(300)).await.unwrap();

        assert_eq!(removed, 1);
        assert!(!store.has("old").await.unwrap());
        assert!(store.has("new").await.unwrap());
    }

    #[test]
    fn expiry_is_strict() {
        let created_at = DateTime::UNIX_EPOCH;
        let entry = nonce("n", created_at);
        let max_age = TimeDelta::seconds(2);

        assert!(!entry.is_expired(max_age, created_at + max_age));
        assert!(entry.is_expired(max_age, created_at + max_age + TimeDelta::milliseconds(1)));
        assert!(!entry.is_expired(TimeDelta::MAX, Utc::now()));
    }
}
