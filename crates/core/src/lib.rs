//! Domain types for feedkit: event vocabulary, polymorphic references,
//! audience and visibility rules, and text handling.
//!
//! Nothing in this crate touches the database.

pub mod audience;
pub mod entity;
pub mod error;
pub mod event;
pub mod text;
pub mod types;
pub mod visibility;
