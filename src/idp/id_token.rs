//! Identity-token (OIDC `id_token`) verification.
//!
//! The identity token is the only IdP artifact the gateway inspects;
//! access and refresh tokens stay opaque. Signature verification is
//! shared with the gateway codec, the claim checks here are OIDC's.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;

use crate::token::codec::{decode_header, split_token, verify_signature};
use crate::token::{Error, Jwks, CLOCK_SKEW_SECONDS};

/// Claims extracted from a verified identity token.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub aud: Audience,
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// OIDC allows `aud` to be a single string or an array of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::One(aud) => aud == client_id,
            Self::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Verify an identity token against the IdP key set and the values the
/// gateway pinned when the flow began.
///
/// Checks, in order: structure, signature by `kid`, issuer, audience,
/// expiry, issued-at skew, and the replay nonce from the login request.
///
/// # Errors
///
/// Returns a [`Error`] naming the first check that failed.
pub fn verify_id_token(
    token: &str,
    jwks: &Jwks,
    expected_issuer: &str,
    client_id: &str,
    expected_nonce: &str,
    now: i64,
) -> Result<IdTokenClaims, Error> {
    let (header_b64, claims_b64, sig_b64) = split_token(token)?;
    let (kid, _typ) = decode_header(header_b64)?;
    let jwk = jwks.find_by_kid(&kid).ok_or(Error::UnknownKid(kid))?;
    verify_signature(header_b64, claims_b64, sig_b64, jwk.to_rsa_public_key()?)?;

    let claims_json = Base64UrlUnpadded::decode_vec(claims_b64).map_err(|_| Error::Base64)?;
    let claims: IdTokenClaims = serde_json::from_slice(&claims_json)?;

    if claims.iss != expected_issuer {
        return Err(Error::InvalidIssuer);
    }
    if !claims.aud.contains(client_id) {
        return Err(Error::InvalidAudience);
    }
    if claims.exp <= now {
        return Err(Error::Expired);
    }
    if claims.iat > now + CLOCK_SKEW_SECONDS {
        return Err(Error::IssuedInFuture);
    }
    if claims.nonce.as_deref() != Some(expected_nonce) {
        return Err(Error::InvalidNonce);
    }

    Ok(claims)
}
