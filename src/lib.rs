// src/lib.rs

//! memos-migrate library
//!
//! Imports Bluesky and X posts into a Memos instance, removes duplicate or
//! outdated notes, and copies notes between accounts.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
