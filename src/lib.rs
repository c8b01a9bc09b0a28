//! Fetch the EPA fuel-economy dataset, trim it to a fixed set of columns and
//! answer table, search and grouped-mean queries over it.

pub mod acquire;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod snapshot;
pub mod state;
