//! Postgres-backed order and store repositories

pub mod pool;
pub mod orders;
pub mod stores;
