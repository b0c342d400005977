//! Webhook authenticity: HMAC-SHA256 over the raw request body, hex encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_over(secret: &str, payload: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(mac)
}

/// Hex signature the gateway attaches to `payload`.
pub fn sign(secret: &str, payload: &[u8]) -> String {
    mac_over(secret, payload)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Constant-time check of `signature` against the exact bytes received.
pub fn verify(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    mac_over(secret, payload).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"event":"payment.captured"}"#;

    #[test]
    fn test_signature_roundtrip() {
        let signature = sign(SECRET, BODY);
        assert_eq!(signature.len(), 64);
        assert!(verify(SECRET, BODY, &signature));
        assert!(verify(SECRET, BODY, &signature.to_uppercase()));
    }

    #[test]
    fn test_rejects_tampered_body_and_wrong_secret() {
        let signature = sign(SECRET, BODY);
        assert!(!verify(SECRET, br#"{"event":"payment.failed"}"#, &signature));
        assert!(!verify("other", BODY, &signature));
    }

    #[test]
    fn test_rejects_malformed_signature() {
        assert!(!verify(SECRET, BODY, "not-hex"));
        assert!(!verify(SECRET, BODY, ""));
        assert!(!verify(SECRET, BODY, "abcd"));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign("Jefe", b"what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
