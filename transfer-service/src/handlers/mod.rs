//! Handler模块

pub mod clickhouse;
pub mod file;
pub mod health;
