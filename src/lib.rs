//! Offline layer for the movie app: a cache-first request interceptor whose
//! cache is filled at install time, and a durable lookup queue that is
//! flushed to every open client when a background-sync trigger arrives.

pub mod cache;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod lookup;
pub mod network;
pub mod queue;
pub mod sync;
pub mod worker;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
