pub mod audit;
pub mod error;
pub mod file_service;
pub mod metadata_store;
pub mod naming;
pub mod quota;
pub mod range;
pub mod rate_limit;
pub mod storage;
pub mod stream_registry;
pub mod streaming;
pub mod worker;
