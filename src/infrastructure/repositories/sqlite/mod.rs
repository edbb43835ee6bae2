// src/infrastructure/repositories/sqlite/mod.rs
pub mod backup;
pub mod connection;
pub mod error;
pub mod maintenance;
pub mod model;
pub mod repository;
pub mod schema;
pub mod tags;
