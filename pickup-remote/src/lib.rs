//! # pickup-remote
//!
//! Blocking HTTP adapters for the two remote systems.
//!
//! - [`SourceClient`]: order-management REST API (list, get, status write-back,
//!   OAuth authorization-code exchange)
//! - [`TargetClient`]: commerce platform GraphQL endpoint
//! - [`TokenStore`]: in-memory [`pickup_core::CredentialProvider`]
//!
//! Every request goes through a `ureq::Agent` built with a bounded timeout.

pub mod credentials;
mod graphql;
pub mod http;
pub mod source;
pub mod target;

pub use credentials::TokenStore;
pub use source::{exchange_authorization_code, OAuthClient, SourceClient};
pub use target::TargetClient;
