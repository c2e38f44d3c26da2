//! Created-token repository

use crate::cell::Address;
use crate::error::{LaunchError, LaunchResult};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// A token whose creation message the wallet signed and sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedToken {
    pub id: Uuid,
    pub name: String,
    pub ticker: String,
    pub decimals: u8,
    pub total_supply_units: u64,
    pub owner: Address,
    /// Representation hash of the creation payload
    pub message_hash: String,
    /// Wallet-reported BOC of the sent external message
    pub transaction_boc: String,
    pub created_at: DateTime<Utc>,
    /// Deployed jetton master, once an indexer reports it
    pub jetton_address: Option<Address>,
}

/// Storage for created tokens
#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn add(&self, token: CreatedToken) -> LaunchResult<()>;

    /// Newest first
    async fn list(&self) -> LaunchResult<Vec<CreatedToken>>;

    async fn find_by_id(&self, id: Uuid) -> LaunchResult<Option<CreatedToken>>;

    /// Record the deployed jetton address for a created token
    async fn attach_address(&self, id: Uuid, address: Address) -> LaunchResult<CreatedToken>;
}

/// Process-local repository
#[derive(Default)]
pub struct InMemoryTokenRepository {
    tokens: DashMap<Uuid, CreatedToken>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn add(&self, token: CreatedToken) -> LaunchResult<()> {
        if self.tokens.contains_key(&token.id) {
            return Err(LaunchError::Internal(format!(
                "token {} already recorded",
                token.id
            )));
        }
        info!("Recorded token {} ({})", token.ticker, token.id);
        self.tokens.insert(token.id, token);
        Ok(())
    }

    async fn list(&self) -> LaunchResult<Vec<CreatedToken>> {
        let mut tokens: Vec<CreatedToken> =
            self.tokens.iter().map(|entry| entry.value().clone()).collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    async fn find_by_id(&self, id: Uuid) -> LaunchResult<Option<CreatedToken>> {
        Ok(self.tokens.get(&id).map(|entry| entry.value().clone()))
    }

    async fn attach_address(&self, id: Uuid, address: Address) -> LaunchResult<CreatedToken> {
        let mut entry = self
            .tokens
            .get_mut(&id)
            .ok_or_else(|| LaunchError::Internal(format!("unknown token {}", id)))?;
        entry.jetton_address = Some(address);
        debug!("Attached jetton address {} to token {}", address, id);
        Ok(entry.clone())
    }
}
