//! Database layer
//!
//! Relational store behind a backend-agnostic pool (SQLite by default, MySQL
//! for larger deployments), embedded migrations, and repositories.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
