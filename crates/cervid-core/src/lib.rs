//! Core types shared by the Cervid crates.

pub mod error;
pub mod transform;

pub use error::{CervidError, Result};
pub use transform::Transform;
