//! Read-only token catalog used to resolve swap legs

use crate::cell::Address;
use crate::config::CatalogTokenConfig;
use crate::error::{LaunchError, LaunchResult};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// What the catalog knows about a tradable token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub address: Address,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenCatalog: Send + Sync {
    /// Fails with `CatalogLookup` when the id is unknown
    async fn lookup_token(&self, id: &str) -> LaunchResult<TokenSummary>;

    async fn list_tokens(&self) -> LaunchResult<Vec<TokenSummary>>;
}

/// Catalog seeded once from configuration
#[derive(Debug, Default)]
pub struct StaticCatalog {
    tokens: BTreeMap<String, TokenSummary>,
}

impl StaticCatalog {
    pub fn new(tokens: impl IntoIterator<Item = TokenSummary>) -> Self {
        Self {
            tokens: tokens.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    /// Build from config entries, validating every address
    pub fn from_config(entries: &[CatalogTokenConfig]) -> LaunchResult<Self> {
        let tokens = entries
            .iter()
            .map(|entry| {
                Ok(TokenSummary {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    symbol: entry.symbol.clone(),
                    decimals: entry.decimals,
                    address: Address::parse(&entry.address).map_err(|e| {
                        LaunchError::Config(format!("catalog token {}: {}", entry.id, e))
                    })?,
                })
            })
            .collect::<LaunchResult<Vec<_>>>()?;
        debug!("Catalog loaded with {} tokens", tokens.len());
        Ok(Self::new(tokens))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}

#[async_trait]
impl TokenCatalog for StaticCatalog {
    async fn lookup_token(&self, id: &str) -> LaunchResult<TokenSummary> {
        self.tokens
            .get(id)
            .cloned()
            .ok_or_else(|| LaunchError::CatalogLookup {
                token_id: id.to_string(),
            })
    }

    async fn list_tokens(&self) -> LaunchResult<Vec<TokenSummary>> {
        Ok(self.tokens.values().cloned().collect())
    }
}
