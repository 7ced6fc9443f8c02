//! Payment signature verification.
//!
//! Razorpay signs checkout callbacks with HMAC-SHA256 over
//! `"{gateway_order_id}|{gateway_payment_id}"` keyed by the API secret, and
//! webhooks with the same construction over the raw body keyed by the
//! webhook secret. Verification fails closed and compares in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded HMAC-SHA256 of `message` under `secret`.
/// Returns `None` when the key is unusable, which callers treat as
/// "not verified".
fn hmac_hex(message: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a checkout callback signature. No side effects; the secret is
/// never logged.
pub fn verify_payment_signature(
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    let message = format!("{}|{}", gateway_order_id, gateway_payment_id);
    match hmac_hex(message.as_bytes(), secret) {
        Some(expected) => constant_time_eq(&expected, signature),
        None => false,
    }
}

/// Verifies a webhook signature computed over the raw request body.
pub fn verify_webhook_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    match hmac_hex(payload, secret) {
        Some(expected) => constant_time_eq(&expected, signature),
        None => false,
    }
}

/// Signs the checkout message; used by tests and the reconciliation probe.
pub fn compute_payment_signature(
    gateway_order_id: &str,
    gateway_payment_id: &str,
    secret: &str,
) -> Option<String> {
    let message = format!("{}|{}", gateway_order_id, gateway_payment_id);
    hmac_hex(message.as_bytes(), secret)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "rzp_test_secret_4f1c9";

    #[test]
    fn signature_is_deterministic() {
        let a = compute_payment_signature("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", SECRET)
            .unwrap();
        let b = compute_payment_signature("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", SECRET)
            .unwrap();
        assert_eq!(a, b);
        assert!(verify_payment_signature(
            "order_9A33XWu170gUtm",
            "pay_29QQoUBi66xm2f",
            &a,
            SECRET
        ));
    }

    #[test]
    fn signature_from_wrong_secret_always_fails() {
        let forged =
            compute_payment_signature("order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f", "wrong-secret")
                .unwrap();
        assert!(!verify_payment_signature(
            "order_9A33XWu170gUtm",
            "pay_29QQoUBi66xm2f",
            &forged,
            SECRET
        ));
    }

    #[test]
    fn tampered_ids_fail_verification() {
        let sig = compute_payment_signature("order_A", "pay_B", SECRET).unwrap();
        assert!(!verify_payment_signature("order_A", "pay_C", &sig, SECRET));
        assert!(!verify_payment_signature("order_X", "pay_B", &sig, SECRET));
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!(!verify_payment_signature("order_A", "pay_B", "", SECRET));
        assert!(!verify_payment_signature(
            "order_A",
            "pay_B",
            "deadbeef",
            SECRET
        ));
    }

    #[test]
    fn webhook_signature_round_trips() {
        let body = br#"{"event":"payment.captured","payload":{}}"#;
        let sig = {
            let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        };
        assert!(verify_webhook_signature(body, &sig, SECRET));
        assert!(!verify_webhook_signature(body, &sig, "other-secret"));
        assert!(!verify_webhook_signature(b"{}", &sig, SECRET));
    }

    #[test]
    fn constant_time_eq_requires_equal_lengths() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }
}
