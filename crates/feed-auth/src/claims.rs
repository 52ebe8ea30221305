//! Expiry-claim codec for opaque signed tokens
//!
//! The issuing server hands out JWTs whose payload carries a numeric `exp`
//! claim (unix seconds). This layer decodes only that claim — the signature
//! is not verified; the issuing service is the trust boundary. Any malformed
//! input is a decode error, treated identically to an absent token by the
//! store: nothing is cached, nothing partially trusted.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{Error, Result};

/// Decode the `exp` claim from a token and return it in unix milliseconds.
///
/// The token must have exactly three dot-separated segments; the middle
/// segment must be URL-safe base64 (no padding) wrapping a JSON object with
/// a numeric `exp` field in seconds.
pub fn decode_expiry(token: &str) -> Result<u64> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(Error::ClaimDecode(
                "token must have exactly three segments".into(),
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::ClaimDecode(format!("payload is not base64url: {e}")))?;

    let claims: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| Error::ClaimDecode(format!("payload is not JSON: {e}")))?;

    let exp = claims
        .get("exp")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| Error::ClaimDecode("missing or non-numeric exp claim".into()))?;

    exp.checked_mul(1000)
        .ok_or_else(|| Error::ClaimDecode("exp claim out of range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build an unsigned test token with the given payload JSON.
    fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn exp_claim_is_returned_in_milliseconds() {
        let token = token_with_payload(r#"{"exp":1735500000,"user_id":7}"#);
        assert_eq!(decode_expiry(&token).unwrap(), 1_735_500_000_000);
    }

    #[test]
    fn missing_exp_claim_fails() {
        let token = token_with_payload(r#"{"user_id":7}"#);
        assert!(matches!(
            decode_expiry(&token),
            Err(Error::ClaimDecode(_))
        ));
    }

    #[test]
    fn exp_too_large_for_milliseconds_fails() {
        // One past the largest exp that survives the seconds-to-ms conversion
        let huge = u64::MAX / 1000 + 1;
        let token = token_with_payload(&format!(r#"{{"exp":{huge}}}"#));
        assert!(matches!(
            decode_expiry(&token),
            Err(Error::ClaimDecode(_))
        ));
    }

    #[test]
    fn non_numeric_exp_fails() {
        let token = token_with_payload(r#"{"exp":"soon"}"#);
        assert!(decode_expiry(&token).is_err());
    }

    #[test]
    fn wrong_segment_count_fails() {
        assert!(decode_expiry("only.two").is_err());
        assert!(decode_expiry("a.b.c.d").is_err());
        assert!(decode_expiry("").is_err());
    }

    #[test]
    fn invalid_base64_payload_fails() {
        assert!(decode_expiry("header.@@not-base64@@.sig").is_err());
    }

    #[test]
    fn non_json_payload_fails() {
        let payload = URL_SAFE_NO_PAD.encode(b"not json at all");
        let token = format!("h.{payload}.s");
        assert!(decode_expiry(&token).is_err());
    }
}
