//! API handlers for the authentication gateway.

pub mod auth;
pub mod health;
pub mod root;
