//! Core library for the studyhall quiz trainer: content loading, the quiz
//! session state machine, deterministic option shuffling, area access
//! policy, local persistence, and remote learning-state sync.

pub mod access;
pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod remote;
pub mod session;
pub mod shuffle;
pub mod store;
pub mod sync;
pub mod types;

pub use store::Store;
