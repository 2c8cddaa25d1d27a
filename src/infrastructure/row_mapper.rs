use crate::domain::models::{Block, DEFAULT_BLOCK_COLOR};
use crate::infrastructure::block_api_client::BlockRow;
use crate::infrastructure::error::EngineError;
use serde_json::Value;

/// Projects a domain block into the flat row shape the hosted table
/// stores, attaching the owning user.
pub fn encode_block_row(block: &Block, user_id: &str) -> BlockRow {
    BlockRow {
        id: block.id.clone(),
        user_id: user_id.to_string(),
        day: block.day,
        starttime: block.start_time,
        endtime: block.end_time,
        title: block.title.clone(),
        description: block.description.clone(),
        color: block.color.clone(),
    }
}

/// Rebuilds a domain block from a stored row.
///
/// Rows written by older clients carry numbers as JSON strings and may
/// use the legacy `colour` column, so every field goes through a
/// coercion step instead of strict typing. A row without a usable id,
/// day, or time range is an error the caller should skip.
pub fn decode_block_row(row: &Value) -> Result<Block, EngineError> {
    let id = coerce_string(row.get("id"))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| EngineError::Store("block row missing id".to_string()))?;
    let day = coerce_u32(row.get("day"))
        .ok_or_else(|| EngineError::Store(format!("block row {id} missing day")))?;
    let start_time = coerce_f64(row.get("starttime"))
        .ok_or_else(|| EngineError::Store(format!("block row {id} missing starttime")))?;
    let end_time = coerce_f64(row.get("endtime"))
        .ok_or_else(|| EngineError::Store(format!("block row {id} missing endtime")))?;

    let color = coerce_string(row.get("color"))
        .filter(|value| !value.is_empty())
        .or_else(|| coerce_string(row.get("colour")).filter(|value| !value.is_empty()))
        .unwrap_or_else(|| DEFAULT_BLOCK_COLOR.to_string());

    Ok(Block {
        id,
        day,
        start_time,
        end_time,
        title: coerce_string(row.get("title")).unwrap_or_default(),
        description: coerce_string(row.get("description")).unwrap_or_default(),
        color,
    })
}

fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn coerce_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_u32(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
