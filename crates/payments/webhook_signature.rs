use anyhow::{Result, anyhow, bail};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Verifies `Stripe-Signature` headers. https://stripe.com/docs/webhooks/signatures
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    pub fn new(secret: String, tolerance_secs: u64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    /// Checks `signature_header` against `payload` as of `now` (unix seconds).
    /// Nothing in the payload is parsed here.
    pub fn verify_at(&self, payload: &[u8], signature_header: &str, now: i64) -> Result<()> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp.ok_or_else(|| anyhow!("missing timestamp in signature header"))?;
        if signatures.is_empty() {
            bail!("missing v1 signature in signature header");
        }

        let signed_at: i64 = timestamp
            .parse()
            .map_err(|_| anyhow!("timestamp in signature header is not a number"))?;
        if now.abs_diff(signed_at) > self.tolerance_secs {
            bail!("signature timestamp outside tolerance window");
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|provided| mac.clone().verify_slice(&provided).is_ok())
                .unwrap_or(false)
        });

        if !matched {
            bail!("invalid webhook signature");
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
