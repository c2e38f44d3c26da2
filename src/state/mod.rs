//! Created-token records
//!
//! The repository is constructed in `main` and injected into the submission
//! coordinator and the API.

mod repository;

pub use repository::{CreatedToken, InMemoryTokenRepository, TokenRepository};
