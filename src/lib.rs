//! Feed sync scheduler and daily digest worker.
//!
//! The scheduler keeps three job classes (feed sync, cleanup, digest) in
//! line with settings stored in SQLite. The digest pipeline groups recent
//! items by story, summarizes each group with a generative model and stores
//! one entry per story.

pub mod ai;
pub mod config;
pub mod db;
pub mod digest;
pub mod error;
pub mod feed;
pub mod lease;
pub mod models;
pub mod scheduler;
pub mod services;
