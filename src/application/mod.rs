// src/application/mod.rs
pub mod dto;
pub mod service;
pub mod store;
pub mod usecase;
