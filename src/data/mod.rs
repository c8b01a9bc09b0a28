//! Data layer: schema, table types, projection, loading, and queries.
//!
//! Architecture:
//! ```text
//!   database.csv (extracted, all columns)
//!        │
//!        ▼
//!   ┌────────────┐
//!   │ projector  │  keep schema columns, untouched copy beside it
//!   └────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse CSV → Dataset (cells typed by schema)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────────────┐
//!   │ filter / aggregate    │  search, category filters, grouped means
//!   └──────────────────────┘
//! ```

pub mod aggregate;
pub mod filter;
pub mod loader;
pub mod model;
pub mod projector;
pub mod schema;
