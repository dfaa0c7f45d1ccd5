//! Filesystem-backed full-page cache.
//!
//! The crate is split the usual way:
//!
//! - [`cache`]: store, controller, invalidation coordinator and hook wiring
//! - [`domain`]: page classification and content taxonomy
//! - [`application`]: administrative actions and plugin lifecycle
//! - [`infra`]: settings persistence and telemetry
//! - [`config`]: deployment settings for the `pagecache` binary

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
