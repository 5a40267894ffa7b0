//! Auth handlers and supporting modules.
//!
//! This module coordinates local credential auth, session lifecycle, and
//! Google federation.
//!
//! ## Token model
//!
//! Two signed tokens ride in `HttpOnly` cookies: a short-lived access token
//! verified purely from its signature, and a long-lived refresh token bound
//! to a server-side session row. Refresh rotates both and checks the caller's
//! device fingerprint (user-agent + IP) against the session; a mismatch
//! revokes the session outright.
//!
//! ## One-time tokens
//!
//! Email verification and password reset use random single-use secrets; only
//! their SHA-256 digest is stored, and a user holds at most one outstanding
//! token per purpose.

pub(crate) mod admin;
mod cookies;
pub(crate) mod login;
pub(crate) mod oauth;
mod password;
mod principal;
pub(crate) mod profile;
pub(crate) mod register;
pub(crate) mod reset;
pub(crate) mod sessions;
mod state;
mod storage;
mod tokens;
pub(crate) mod types;
mod utils;
pub(crate) mod verification;

pub use state::{AuthConfig, AuthState, GoogleConfig};
