use crate::domain::models::Block;
use crate::infrastructure::block_api_client::BlockApiClient;
use crate::infrastructure::error::EngineError;
use crate::infrastructure::row_mapper::{decode_block_row, encode_block_row};
use std::sync::Arc;

/// Result of a persistence attempt. Store failures are ordinary data,
/// not errors: callers roll back local state and keep running. Only a
/// session expiry escapes as `Err` from the adapter methods.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The write landed. `canonical` carries the row the server echoed
    /// back when the representation was decodable.
    Saved { canonical: Option<Block> },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// `rows_affected` is zero when the row was already gone, which
    /// still counts as success.
    Deleted { rows_affected: usize },
    Failed { reason: String },
}

/// Bridges domain blocks to the row-level client: encodes on the way
/// out, decodes and filters on the way in, and folds transport failures
/// into tagged outcomes.
pub struct BlockStoreAdapter<C: BlockApiClient> {
    client: Arc<C>,
}

impl<C: BlockApiClient> BlockStoreAdapter<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Loads every block owned by `user_id`. Rows that fail to decode
    /// are skipped rather than failing the whole load.
    pub async fn load(&self, user_id: &str) -> Result<Vec<Block>, EngineError> {
        let rows = self.client.list_rows(user_id).await?;
        Ok(rows
            .iter()
            .filter_map(|row| decode_block_row(row).ok())
            .collect())
    }

    pub async fn save(&self, block: &Block, user_id: &str) -> Result<SaveOutcome, EngineError> {
        let row = encode_block_row(block, user_id);
        match self.client.upsert_row(&row).await {
            Ok(rows) => {
                let canonical = rows.first().and_then(|row| decode_block_row(row).ok());
                Ok(SaveOutcome::Saved { canonical })
            }
            Err(EngineError::SessionExpired) => Err(EngineError::SessionExpired),
            Err(error) => Ok(SaveOutcome::Failed {
                reason: error.to_string(),
            }),
        }
    }

    pub async fn delete(
        &self,
        block_id: &str,
        user_id: &str,
    ) -> Result<DeleteOutcome, EngineError> {
        match self.client.delete_row(block_id, user_id).await {
            Ok(rows) => Ok(DeleteOutcome::Deleted {
                rows_affected: rows.len(),
            }),
            Err(EngineError::SessionExpired) => Err(EngineError::SessionExpired),
            Err(error) => Ok(DeleteOutcome::Failed {
                reason: error.to_string(),
            }),
        }
    }
}
