//! Token models, secret redaction, and credential classification.

pub mod secret;
pub mod token;

pub use secret::*;
pub use token::*;
