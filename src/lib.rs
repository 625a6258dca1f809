//! Discourse Post Mirror library.
//!
//! Incrementally mirrors the post history of one or more Discourse forums
//! into SQLite by walking the paginated `/posts.json` endpoint, resuming from
//! a per-forum cursor on every run.

pub mod config;
pub mod constants;
pub mod db;
pub mod discourse;
pub mod error;
pub mod sync;
