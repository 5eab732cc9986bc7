//! Shared types for the oauth2-pkce workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
