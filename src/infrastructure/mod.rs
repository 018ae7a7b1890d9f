// src/infrastructure/mod.rs
pub mod persistence;
pub mod quote;
