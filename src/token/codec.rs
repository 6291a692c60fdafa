use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{errors::Error as RsaError, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use super::jwks::Jwks;

pub const TOKEN_VERSION: u8 = 1;

/// Tokens issued up to this many seconds in the future are accepted.
pub const CLOCK_SKEW_SECONDS: i64 = 30;

// Gateway refresh tokens never need to outlive the session absolute
// ceiling they are bound to.
const REFRESH_TOKEN_TTL_SECONDS: i64 = 14_400;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
    kid: String,
}

impl TokenHeader {
    fn rs256(kid: impl Into<String>) -> Self {
        Self {
            alg: "RS256".to_string(),
            typ: "JWT".to_string(),
            kid: kid.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayClaims {
    pub v: u8,
    pub iss: String,
    pub aud: String,
    /// Subject: the authenticated user id.
    pub sub: String,
    /// Session id this token is bound to.
    pub sid: String,
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    /// For refresh tokens: jti of the access token issued alongside.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ati: Option<String>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("failed to parse RSA key")]
    KeyParse,
    #[error("rsa error")]
    Rsa(#[from] RsaError),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token issued in the future")]
    IssuedInFuture,
    #[error("wrong token type")]
    WrongType,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("invalid nonce")]
    InvalidNonce,
    #[error("invalid token version")]
    InvalidVersion,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub(super) fn decode_private_key(pem_or_der: &[u8]) -> Result<RsaPrivateKey, Error> {
    if pem_or_der.starts_with(b"-----BEGIN") {
        let s = std::str::from_utf8(pem_or_der).map_err(|_| Error::KeyParse)?;
        if let Ok(k) = RsaPrivateKey::from_pkcs8_pem(s) {
            return Ok(k);
        }
        if let Ok(k) = RsaPrivateKey::from_pkcs1_pem(s) {
            return Ok(k);
        }
        return Err(Error::KeyParse);
    }

    if let Ok(k) = RsaPrivateKey::from_pkcs8_der(pem_or_der) {
        return Ok(k);
    }
    if let Ok(k) = RsaPrivateKey::from_pkcs1_der(pem_or_der) {
        return Ok(k);
    }
    Err(Error::KeyParse)
}

/// Split a compact JWT into its three base64url segments.
pub(crate) fn split_token(token: &str) -> Result<(&str, &str, &str), Error> {
    let mut parts = token.split('.');
    let header = parts.next().ok_or(Error::TokenFormat)?;
    let claims = parts.next().ok_or(Error::TokenFormat)?;
    let signature = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }
    Ok((header, claims, signature))
}

/// Verify an RS256 signature over `header.claims` against a JWKS key.
///
/// Shared by the gateway codec and the IdP identity-token verifier; both
/// only differ in the claim checks applied afterwards.
pub(crate) fn verify_signature(
    header_b64: &str,
    claims_b64: &str,
    sig_b64: &str,
    public_key: RsaPublicKey,
) -> Result<(), Error> {
    let verifying_key = VerifyingKey::<Sha256>::new(public_key);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::InvalidSignature)?;
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)
}

pub(crate) fn decode_header(header_b64: &str) -> Result<(String, String), Error> {
    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != "RS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }
    Ok((header.kid, header.typ))
}

/// Issues and verifies gateway tokens with a fixed key pair.
pub struct TokenCodec {
    signing_key: SigningKey<Sha256>,
    jwks: Jwks,
    kid: String,
    issuer: String,
    audience: String,
}

impl TokenCodec {
    /// Build a codec from an RSA private key (PEM or DER).
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be parsed.
    pub fn from_private_key_pem_or_der(
        private_key_pem_or_der: &[u8],
        kid: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, Error> {
        let kid = kid.into();
        let private_key = decode_private_key(private_key_pem_or_der)?;
        let jwks = Jwks::from_rsa_public_key(&RsaPublicKey::from(&private_key), kid.clone())?;
        Ok(Self {
            signing_key: SigningKey::<Sha256>::new(private_key),
            jwks,
            kid,
            issuer: issuer.into(),
            audience: audience.into(),
        })
    }

    /// Public key set matching the signing key; safe to publish.
    #[must_use]
    pub fn jwks(&self) -> &Jwks {
        &self.jwks
    }

    /// Issue a signed access token binding `subject` and `session_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if header/claims JSON cannot be encoded.
    pub fn issue_access_token(
        &self,
        subject: &str,
        session_id: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<String, Error> {
        self.sign(GatewayClaims {
            v: TOKEN_VERSION,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: subject.to_string(),
            sid: session_id.to_string(),
            kind: TokenKind::Access,
            exp: expires_at,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            ati: None,
        })
    }

    /// Issue a signed refresh token linked to a previously issued access
    /// token via its `jti`.
    ///
    /// # Errors
    ///
    /// Returns an error if header/claims JSON cannot be encoded.
    pub fn issue_refresh_token(
        &self,
        subject: &str,
        session_id: &str,
        linked_access_jti: &str,
        now: i64,
    ) -> Result<String, Error> {
        self.sign(GatewayClaims {
            v: TOKEN_VERSION,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: subject.to_string(),
            sid: session_id.to_string(),
            kind: TokenKind::Refresh,
            exp: now + REFRESH_TOKEN_TTL_SECONDS,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            ati: Some(linked_access_jti.to_string()),
        })
    }

    fn sign(&self, claims: GatewayClaims) -> Result<String, Error> {
        let header = TokenHeader::rs256(self.kid.clone());
        let header_b64 = b64e_json(&header)?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify a gateway token and return its decoded claims.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the token is malformed or contains invalid base64/json,
    /// - the signature is invalid or the `kid` is unknown,
    /// - the token is of the wrong type for `expected`,
    /// - the claims fail validation (`v`, `iss`, `aud`, `exp`, `iat`).
    pub fn verify(
        &self,
        token: &str,
        expected: TokenKind,
        now: i64,
    ) -> Result<GatewayClaims, Error> {
        let (header_b64, claims_b64, sig_b64) = split_token(token)?;

        let (kid, _) = decode_header(header_b64)?;
        let jwk = self
            .jwks
            .find_by_kid(&kid)
            .ok_or_else(|| Error::UnknownKid(kid.clone()))?;
        verify_signature(header_b64, claims_b64, sig_b64, jwk.to_rsa_public_key()?)?;

        let claims: GatewayClaims = b64d_json(claims_b64)?;
        if claims.v != TOKEN_VERSION {
            return Err(Error::InvalidVersion);
        }
        if claims.kind != expected {
            return Err(Error::WrongType);
        }
        if claims.iss != self.issuer {
            return Err(Error::InvalidIssuer);
        }
        if claims.aud != self.audience {
            return Err(Error::InvalidAudience);
        }
        if claims.iat > now + CLOCK_SKEW_SECONDS {
            return Err(Error::IssuedInFuture);
        }
        if claims.exp <= now {
            return Err(Error::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn codec() -> TokenCodec {
        TokenCodec::from_private_key_pem_or_der(
            crate::token::test_keys::TEST_PRIVATE_KEY_PEM.as_bytes(),
            "k1",
            "https://gateway.example.test",
            "portiro",
        )
        .expect("test key should parse")
    }

    #[test]
    fn access_token_round_trip() -> Result<(), Error> {
        let codec = codec();
        let token = codec.issue_access_token("u1", "sid-1", NOW + 3600, NOW)?;

        let claims = codec.verify(&token, TokenKind::Access, NOW)?;
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.sid, "sid-1");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.exp, NOW + 3600);
        Ok(())
    }

    #[test]
    fn refresh_token_links_access_jti() -> Result<(), Error> {
        let codec = codec();
        let access = codec.issue_access_token("u1", "sid-1", NOW + 3600, NOW)?;
        let access_claims = codec.verify(&access, TokenKind::Access, NOW)?;

        let refresh = codec.issue_refresh_token("u1", "sid-1", &access_claims.jti, NOW)?;
        let refresh_claims = codec.verify(&refresh, TokenKind::Refresh, NOW)?;
        assert_eq!(refresh_claims.ati.as_deref(), Some(access_claims.jti.as_str()));
        Ok(())
    }

    #[test]
    fn rejects_wrong_type() -> Result<(), Error> {
        let codec = codec();
        let token = codec.issue_access_token("u1", "sid-1", NOW + 3600, NOW)?;
        assert!(matches!(
            codec.verify(&token, TokenKind::Refresh, NOW),
            Err(Error::WrongType)
        ));
        Ok(())
    }

    #[test]
    fn rejects_expired() -> Result<(), Error> {
        let codec = codec();
        let token = codec.issue_access_token("u1", "sid-1", NOW + 60, NOW)?;
        assert!(matches!(
            codec.verify(&token, TokenKind::Access, NOW + 61),
            Err(Error::Expired)
        ));
        Ok(())
    }

    #[test]
    fn clock_skew_tolerance_boundary() -> Result<(), Error> {
        let codec = codec();
        // Issued 30s in the future: accepted. 31s: rejected.
        let token = codec.issue_access_token("u1", "sid-1", NOW + 3600, NOW + CLOCK_SKEW_SECONDS)?;
        assert!(codec.verify(&token, TokenKind::Access, NOW).is_ok());

        let token =
            codec.issue_access_token("u1", "sid-1", NOW + 3600, NOW + CLOCK_SKEW_SECONDS + 1)?;
        assert!(matches!(
            codec.verify(&token, TokenKind::Access, NOW),
            Err(Error::IssuedInFuture)
        ));
        Ok(())
    }

    #[test]
    fn rejects_tampered_claims() -> Result<(), Error> {
        let codec = codec();
        let token = codec.issue_access_token("u1", "sid-1", NOW + 3600, NOW)?;

        let (header_b64, _, sig_b64) = split_token(&token)?;
        let forged = GatewayClaims {
            v: TOKEN_VERSION,
            iss: "https://gateway.example.test".to_string(),
            aud: "portiro".to_string(),
            sub: "someone-else".to_string(),
            sid: "sid-1".to_string(),
            kind: TokenKind::Access,
            exp: NOW + 3600,
            iat: NOW,
            jti: "forged".to_string(),
            ati: None,
        };
        let tampered = format!("{header_b64}.{}.{sig_b64}", b64e_json(&forged)?);
        assert!(matches!(
            codec.verify(&tampered, TokenKind::Access, NOW),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() {
        let codec = codec();
        assert!(matches!(
            codec.verify("not-a-token", TokenKind::Access, NOW),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            codec.verify("a.b.c.d", TokenKind::Access, NOW),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            codec.verify("!.!.!", TokenKind::Access, NOW),
            Err(Error::Base64)
        ));
    }

    #[test]
    fn rejects_token_from_other_key() -> Result<(), Error> {
        let codec = codec();
        let other = TokenCodec::from_private_key_pem_or_der(
            crate::token::test_keys::OTHER_PRIVATE_KEY_PEM.as_bytes(),
            "k1",
            "https://gateway.example.test",
            "portiro",
        )?;
        let token = other.issue_access_token("u1", "sid-1", NOW + 3600, NOW)?;
        assert!(matches!(
            codec.verify(&token, TokenKind::Access, NOW),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }
}
