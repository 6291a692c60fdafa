//! Wire types for the auth endpoints.
//!
//! Session data crosses this boundary only as [`IdentityView`]; IdP
//! tokens have no field to leak through.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use crate::flow::IdentityView;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    /// IdP logout URL the browser should visit to end the upstream session.
    pub logout_url: String,
}

