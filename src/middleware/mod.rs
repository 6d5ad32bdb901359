//! Request middleware: bearer authentication and body validation.

pub mod auth;
pub mod validate;

pub use auth::{authenticate, AuthKeys, Claims};
pub use validate::validate_body;
