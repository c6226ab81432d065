//! News Digest: summarizes the newest newsletter in a Gmail inbox.

pub mod auth;
pub mod bot;
pub mod channels;
pub mod config;
pub mod digest;
pub mod error;
pub mod llm;
pub mod mail;
