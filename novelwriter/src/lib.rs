//! NovelWriter library
//!
//! Core of the NovelWriter writing assistant: the entity store, history
//! context selection, the writing session and its persistence.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
