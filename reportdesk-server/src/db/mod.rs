//! Database layer - connection pool, migrations and repositories
//!
//! - Connection pool, no Arc<Mutex<Connection>>
//! - Rely on DB constraints (unique slugs, foreign keys), map conflicts
//! - Transactions for multi-step operations

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::{create_memory_pool, create_pool};
pub use repos::*;
