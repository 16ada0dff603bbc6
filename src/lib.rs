/// Plaza - social network backend
///
/// Accounts with rotating refresh tokens, a follow graph, image posts with
/// likes and comments, and groups with their own posts and messages, served
/// as a JSON API.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod context;
pub mod db;
pub mod error;
pub mod graph;
pub mod groups;
pub mod jobs;
pub mod media;
pub mod metrics;
pub mod pagination;
pub mod server;
pub mod validation;

pub use context::AppContext;
pub use error::{PlazaError, PlazaResult};
