pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryJobQueue;
pub use postgres::PostgresJobQueue;
