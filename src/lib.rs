//! # citystore
//!
//! Relational storage core for city models: a composable query model
//! compiled to multi-dialect SQL, plus a concurrent import/export
//! pipeline over any relational schema described by a [`schema`] mapping.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Query (filter predicates + projection)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [schema paths]
//! ┌─────────────────────────────────────────────────────────┐
//! │       SchemaMapping (feature types, relations, joins)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [query builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │        SQL tokens, rendered per dialect                  │
//! │        (Postgres / Oracle / SQLite)                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [adapter]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Pipeline: worker pool, id caches, XLink resolution,    │
//! │   event dispatch                                         │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod db;
pub mod event;
pub mod feature;
pub mod filter;
pub mod geometry;
pub mod pipeline;
pub mod schema;
pub mod sql;
pub mod xlink;
