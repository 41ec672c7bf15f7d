//! `maildex`: a fast incremental scanner for Maildir and MH mailboxes.
//!
//! This crate provides the core library for discovering message files,
//! decoding their filename flags, parsing their headers (with a persistent
//! header cache) and assembling them into a mailbox index.

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod maildir;
pub mod model;
pub mod parser;
