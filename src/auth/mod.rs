//! Authentication primitives: tokens, password hashing, and the
//! [`AuthUser`] request extractor.

pub mod extractor;
pub mod password;
pub mod token;

pub use extractor::AuthUser;
pub use token::{Claims, TokenKind, TokenPair, TokenService};
