//! Shared wire types for the GetYourShare client core.
//!
//! Everything the backend sends or receives is declared here so the client
//! crate only ever handles typed, already-normalized values.

pub mod encoded;
pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
