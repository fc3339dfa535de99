//! # Wikistack
//!
//! Multi-tenant persistence for wiki content. Tiddlers live in bags, recipes
//! stack bags into a single view, roles carry ACLs on both, and every write
//! stamps a version so clients can ask for everything changed since a cursor.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! wikistack = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use wikistack::config::EngineConfig;
//! use wikistack::engine::Engine;
//! use wikistack::types::Permission;
//!
//! let engine = Engine::open(&EngineConfig::default())?;
//! let roles = wikistack::auth::roles_for_session(&engine.session_auth(), Some(key))?;
//! let home = engine
//!     .resolver()
//!     .read(&roles, "docs", "Home", Permission::Read)?
//!     .conceal_denied()
//!     .into_result()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the administrative CLI module. Disable with
//!   `default-features = false`.

pub mod attachments;
pub mod auth;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;
pub mod validation;
