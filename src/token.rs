//! Bearer token codec.
//!
//! A token is `"<id>:<secret>"`, where `id` is the decimal record id and
//! `secret` is the plaintext credential. For embedding in URLs the whole
//! string is additionally wrapped in unpadded URL-safe base64.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Separator between id and secret.
pub const SEPARATOR: char = ':';

/// URL-safe alphabet, no padding on encode, padding optional on decode.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Token decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has no ':' separator")]
    MissingSeparator,
    #[error("token id is not a non-negative integer: {0:?}")]
    InvalidId(String),
    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token is not valid UTF-8")]
    Utf8,
}

/// A decoded bearer token.
pub struct ActionToken {
    pub id: i64,
    pub secret: Zeroizing<String>,
}

impl ActionToken {
    pub fn new(id: i64, secret: impl Into<String>) -> Self {
        Self {
            id,
            secret: Zeroizing::new(secret.into()),
        }
    }

    /// Raw `"<id>:<secret>"` form.
    pub fn encode(&self) -> String {
        encode(self.id, &self.secret)
    }

    /// Base64-wrapped form for URLs.
    pub fn encode_wrapped(&self) -> String {
        wrap(&self.encode())
    }
}

impl fmt::Debug for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionToken")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Join id and secret into the raw token form.
pub fn encode(id: i64, secret: &str) -> String {
    format!("{}{}{}", id, SEPARATOR, secret)
}

/// Split a raw token into id and secret.
///
/// Splits at the first separator, so the secret itself may contain one.
pub fn decode(token: &str) -> Result<ActionToken, TokenError> {
    let (id, secret) = token
        .split_once(SEPARATOR)
        .ok_or(TokenError::MissingSeparator)?;

    // `i64::from_str` accepts a leading '+', which is not a valid id.
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenError::InvalidId(id.to_string()));
    }
    let id = id
        .parse::<i64>()
        .map_err(|_| TokenError::InvalidId(id.to_string()))?;

    Ok(ActionToken::new(id, secret))
}

/// Base64-wrap a raw token.
pub fn wrap(token: &str) -> String {
    URL_SAFE_LENIENT.encode(token.as_bytes())
}

/// Strip the base64 layer from a wrapped token.
pub fn unwrap(wrapped: &str) -> Result<Zeroizing<String>, TokenError> {
    let bytes = Zeroizing::new(URL_SAFE_LENIENT.decode(wrapped.trim())?);
    let text = std::str::from_utf8(&bytes).map_err(|_| TokenError::Utf8)?;
    Ok(Zeroizing::new(text.to_string()))
}

/// Unwrap and decode a base64-wrapped token.
pub fn decode_wrapped(wrapped: &str) -> Result<ActionToken, TokenError> {
    decode(&unwrap(wrapped)?)
}

/// Decode a token presented in either form.
///
/// The raw form is tried first; base64 output never contains the separator,
/// so the two forms cannot be confused.
pub fn decode_any(presented: &str) -> Result<ActionToken, TokenError> {
    if presented.contains(SEPARATOR) {
        decode(presented)
    } else {
        decode_wrapped(presented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode(7, "abc"), "7:abc");
        assert_eq!(ActionToken::new(0, "s").encode(), "0:s");
    }

    #[test]
    fn test_roundtrip() {
        for (id, secret) in [(0, "x"), (7, "abcDEF123"), (i64::MAX, "zzzzzzzzzzzzzzzzzzzz")] {
            let token = decode(&encode(id, secret)).unwrap();
            assert_eq!(token.id, id);
            assert_eq!(*token.secret, secret);

            let wrapped = decode_wrapped(&wrap(&encode(id, secret))).unwrap();
            assert_eq!(wrapped.id, id);
            assert_eq!(*wrapped.secret, secret);
        }
    }

    #[test]
    fn test_secret_may_contain_separator() {
        let token = decode("12:a:b").unwrap();
        assert_eq!(token.id, 12);
        assert_eq!(*token.secret, "a:b");
    }

    #[test]
    fn test_empty_secret_is_well_formed() {
        let token = decode("3:").unwrap();
        assert_eq!(token.id, 3);
        assert!(token.secret.is_empty());
    }

    #[test]
    fn test_malformed() {
        assert_eq!(decode("nocolon").unwrap_err(), TokenError::MissingSeparator);
        assert_eq!(decode(":secret").unwrap_err(), TokenError::InvalidId(String::new()));
        assert!(matches!(decode("-1:secret"), Err(TokenError::InvalidId(_))));
        assert!(matches!(decode("+1:secret"), Err(TokenError::InvalidId(_))));
        assert!(matches!(decode("1a:secret"), Err(TokenError::InvalidId(_))));
        assert!(matches!(
            decode("99999999999999999999:secret"),
            Err(TokenError::InvalidId(_))
        ));
    }

    #[test]
    fn test_wrapped_malformed() {
        assert!(matches!(decode_wrapped("!!!"), Err(TokenError::Base64(_))));
        // Valid base64 of invalid UTF-8.
        assert_eq!(decode_wrapped(&URL_SAFE_LENIENT.encode([0xff, 0xfe])).unwrap_err(), TokenError::Utf8);
        // Valid base64 of a token without separator.
        assert_eq!(decode_wrapped(&wrap("12345")).unwrap_err(), TokenError::MissingSeparator);
    }

    #[test]
    fn test_wrap_is_url_safe() {
        let wrapped = wrap("42:??>>~~secret");
        assert!(!wrapped.contains(['+', '/', '=', ':']));
    }

    #[test]
    fn test_unwrap_accepts_padding() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode("5:abc");
        assert!(padded.ends_with('='));
        let token = decode_wrapped(&padded).unwrap();
        assert_eq!(token.id, 5);
        assert_eq!(*token.secret, "abc");
    }

    #[test]
    fn test_decode_any() {
        assert_eq!(decode_any("9:raw").unwrap().id, 9);
        assert_eq!(decode_any(&wrap("10:wrapped")).unwrap().id, 10);
        assert!(decode_any("").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", ActionToken::new(1, "topsecret"));
        assert!(!debug.contains("topsecret"));
    }
}
