//! # genmix
//!
//! Incremental ingestion of the NESO Historic GB Generation Mix dataset into a
//! time-keyed SQLite warehouse.
//!
//! The binaries (`genmix-ingest`, `genmix-db`) are thin wrappers around
//! [`ingest`], so the pipeline can be driven from tests without spawning
//! processes or touching the network.

pub mod ingest;
