//! SchemaSync - metadata synchronization and column-semantics versioning
//!
//! Walks registered data sources through a query-federation gateway, records
//! their schema → object → field tree, and keeps a versioned history of each
//! field's description.

pub mod admin;
pub mod annotate;
pub mod catalog;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod entity;
pub mod introspect;
pub mod pipeline;
pub mod store;
pub mod tracker;
