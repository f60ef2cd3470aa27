use anyhow::{anyhow, bail, Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Verifies an `X-Hub-Signature-256` value (`sha256=<hex>`) over `payload`.
pub fn verify_github_sha256_signature(payload: &[u8], signature: &str, secret: &str) -> Result<()> {
    let Some(digest_hex) = signature.trim().strip_prefix("sha256=") else {
        bail!("github webhook signature must use sha256=<hex> format");
    };
    let signature_bytes = decode_hex(digest_hex)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .context("failed to initialize webhook HMAC verifier")?;
    mac.update(payload);
    mac.verify_slice(&signature_bytes)
        .map_err(|_| anyhow!("webhook signature verification failed"))
}

fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("signature digest cannot be empty");
    }
    if trimmed.len() % 2 != 0 {
        bail!("signature digest must have an even number of hex characters");
    }

    let raw = trimmed.as_bytes();
    raw.chunks(2)
        .map(|pair| {
            let hex = std::str::from_utf8(pair).context("invalid utf-8 in digest")?;
            u8::from_str_radix(hex, 16)
                .with_context(|| format!("invalid hex byte '{hex}' in signature digest"))
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn sign_payload(payload: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(payload);
    let digest = mac.finalize().into_bytes();
    let hex = digest
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    format!("sha256={hex}")
}
