//! Row structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` struct matching the database row
//! - `Deserialize` DTOs for creates and bulk updates

pub mod event;
pub mod poly_ref;
pub mod reply;
