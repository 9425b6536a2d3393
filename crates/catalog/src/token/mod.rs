//! Resumption token management.
//!
//! - [`ResumptionToken`] - the decoded token and its string encoding
//! - [`TokenIdGenerator`] - unique, monotonic ids
//! - [`TokenStore`] - the single-use, TTL-aware token table

pub mod codec;
pub mod id;
pub mod store;

pub use codec::{ResumptionToken, TokenKind};
pub use id::TokenIdGenerator;
pub use store::{IssuedToken, ResolvedToken, TokenStore};
