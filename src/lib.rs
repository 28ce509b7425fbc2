//! Workload generator and throughput harness for a remote key-value store.
//!
//! A run populates a fixed key space, drives a read/write mix of `get` and
//! `put` calls against a [`store::KvStore`], and samples throughput into a
//! CSV series while the workload runs.

pub mod client;
pub mod clock;
pub mod common;
pub mod error;
pub mod harness;
pub mod message;
pub mod populate;
pub mod retry;
pub mod server;
pub mod stats;
pub mod store;
pub mod workload;
