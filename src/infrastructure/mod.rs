pub mod block_api_client;
pub mod block_store;
pub mod config;
pub mod error;
pub mod row_mapper;
pub mod rule_store;
pub mod storage;
