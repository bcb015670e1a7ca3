//! Behaviour every backend must share, run against memory, SQLite and redb.
#![cfg(all(feature = "sqlite", feature = "document"))]

#[path = "../support/mod.rs"]
mod support;

mod crud;
mod filters;
mod parity;
