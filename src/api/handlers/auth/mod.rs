//! Login flow and session lifecycle endpoints.

pub mod callback;
pub mod login;
pub mod logout;
pub mod refresh;
pub mod session;
pub mod state;
pub mod types;
pub(crate) mod utils;
