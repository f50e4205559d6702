//! renderq Server Library
//!
//! Asynchronous video render orchestration: an HTTP surface that accepts
//! render submissions, tracks their lifecycle in an in-memory store, drives
//! an external rendering engine in the background, and sweeps out expired
//! tasks and artifacts.

pub mod config;
pub mod engine;
pub mod http;
pub mod invoker;
pub mod state;
pub mod sweeper;

pub use config::Config;
pub use state::AppState;
pub use sweeper::Sweeper;
