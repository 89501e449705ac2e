pub mod memory_store;
pub mod pg_gateway;
pub mod store;
pub mod strategy;

pub use memory_store::{FileRow, MemoryStore, StoreCall};
pub use pg_gateway::PgGateway;
pub use store::{SqlValue, Store};
pub use strategy::{strategy_for, BatchedCommit, DryRunPrint, InsertStrategy, PerRecordCommit};
