//! Payment confirmation webhook (Stripe format)
//!
//! `Stripe-Signature: t=<unix>,v1=<hex hmac-sha256("<t>.<body>")>`

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Events older than this are rejected (replay protection)
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Invalid Stripe-Signature header")]
    MalformedHeader,

    #[error("Invalid signature hex")]
    InvalidHex,

    #[error("HMAC key error")]
    Key,

    #[error("Webhook signature mismatch")]
    Mismatch,

    #[error("Webhook timestamp outside tolerance")]
    Expired,

    #[error("Invalid webhook payload: {0}")]
    Payload(String),
}

/// Verify against the current clock
pub fn verify_webhook_signature(payload: &[u8], sig_header: &str, secret: &str) -> Result<(), WebhookError> {
    verify_webhook_signature_at(payload, sig_header, secret, chrono::Utc::now().timestamp())
}

pub fn verify_webhook_signature_at(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }
    if timestamp.is_empty() || signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    let mut matched = false;
    for signature in signatures {
        let sig_bytes = hex::decode(signature).map_err(|_| WebhookError::InvalidHex)?;
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::Key)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        // verify_slice 是常量时间比较
        if mac.verify_slice(&sig_bytes).is_ok() {
            matched = true;
            break;
        }
    }
    if !matched {
        return Err(WebhookError::Mismatch);
    }

    let ts: i64 = timestamp.parse().map_err(|_| WebhookError::MalformedHeader)?;
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(WebhookError::Expired);
    }
    Ok(())
}

/// Build a `Stripe-Signature` header value for `payload`
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::Key)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())))
}

/// Webhook events this service acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// `checkout.session.completed` carrying our order id
    CheckoutCompleted {
        event_id: String,
        session_id: String,
        order_id: String,
    },
    /// `checkout.session.expired`: the customer never paid
    CheckoutExpired {
        event_id: String,
        session_id: String,
        order_id: String,
    },
    /// Anything else, acknowledged and ignored
    Ignored { event_type: String },
}

/// Parse a verified webhook body
pub fn parse_event(payload: &[u8]) -> Result<PaymentEvent, WebhookError> {
    let event: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))?;

    let event_type = event["type"].as_str().unwrap_or_default();
    if !matches!(event_type, "checkout.session.completed" | "checkout.session.expired") {
        return Ok(PaymentEvent::Ignored {
            event_type: event_type.to_string(),
        });
    }

    let object = &event["data"]["object"];
    let session_id = object["id"]
        .as_str()
        .ok_or_else(|| WebhookError::Payload("missing data.object.id".into()))?;
    let order_id = object["metadata"]["order_id"]
        .as_str()
        .or_else(|| object["client_reference_id"].as_str())
        .ok_or_else(|| WebhookError::Payload("missing metadata.order_id".into()))?;

    let event_id = event["id"].as_str().unwrap_or_default().to_string();
    let (session_id, order_id) = (session_id.to_string(), order_id.to_string());
    Ok(if event_type == "checkout.session.expired" {
        PaymentEvent::CheckoutExpired {
            event_id,
            session_id,
            order_id,
        }
    } else {
        PaymentEvent::CheckoutCompleted {
            event_id,
            session_id,
            order_id,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn completed_body() -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_1", "metadata": {"order_id": "o-1"}}}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_signed_payload_verifies() {
        let body = completed_body();
        let header = sign_payload(&body, SECRET, 1_700_000_000).unwrap();
        assert_eq!(
            verify_webhook_signature_at(&body, &header, SECRET, 1_700_000_100),
            Ok(())
        );
    }

    #[test]
    fn test_tampered_body_rejected() {
        let body = completed_body();
        let header = sign_payload(&body, SECRET, 1_700_000_000).unwrap();
        let mut tampered = body.clone();
        tampered.push(b' ');
        assert_eq!(
            verify_webhook_signature_at(&tampered, &header, SECRET, 1_700_000_000),
            Err(WebhookError::Mismatch)
        );
        assert_eq!(
            verify_webhook_signature_at(&body, &header, "whsec_other", 1_700_000_000),
            Err(WebhookError::Mismatch)
        );
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let body = completed_body();
        let header = sign_payload(&body, SECRET, 1_700_000_000).unwrap();
        assert_eq!(
            verify_webhook_signature_at(&body, &header, SECRET, 1_700_000_000 + 301),
            Err(WebhookError::Expired)
        );
    }

    #[test]
    fn test_malformed_header() {
        let body = completed_body();
        assert_eq!(
            verify_webhook_signature_at(&body, "v1=abcd", SECRET, 0),
            Err(WebhookError::MalformedHeader)
        );
        assert_eq!(
            verify_webhook_signature_at(&body, "t=1,v1=zz", SECRET, 1),
            Err(WebhookError::InvalidHex)
        );
    }

    #[test]
    fn test_parse_completed_event() {
        assert_eq!(
            parse_event(&completed_body()).unwrap(),
            PaymentEvent::CheckoutCompleted {
                event_id: "evt_1".into(),
                session_id: "cs_1".into(),
                order_id: "o-1".into(),
            }
        );
    }

    #[test]
    fn test_parse_expired_event() {
        let body = br#"{"id":"evt_4","type":"checkout.session.expired","data":{"object":{"id":"cs_2","client_reference_id":"o-2"}}}"#;
        assert_eq!(
            parse_event(body).unwrap(),
            PaymentEvent::CheckoutExpired {
                event_id: "evt_4".into(),
                session_id: "cs_2".into(),
                order_id: "o-2".into(),
            }
        );
    }

    #[test]
    fn test_other_events_ignored() {
        let body = br#"{"id":"evt_2","type":"charge.refunded","data":{"object":{}}}"#;
        assert_eq!(
            parse_event(body).unwrap(),
            PaymentEvent::Ignored {
                event_type: "charge.refunded".into()
            }
        );
    }

    #[test]
    fn test_completed_without_order_id() {
        let body = br#"{"id":"evt_3","type":"checkout.session.completed","data":{"object":{"id":"cs_9"}}}"#;
        assert!(matches!(parse_event(body), Err(WebhookError::Payload(_))));
    }
}
