pub mod ledger;
pub mod memory_ledger;
pub mod pool;
