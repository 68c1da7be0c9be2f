//! Record store implementations: PostgreSQL and in-memory.

mod memory;
mod postgres;
pub use memory::MemoryStore;
pub use postgres::PgStore;
