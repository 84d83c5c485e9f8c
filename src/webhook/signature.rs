use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::Config;
use crate::webhook::secrets::Secrets;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("unknown deploy target `{0}`")]
    UnknownTarget(String),
    #[error("missing `x-hub-signature-256` header")]
    MissingSignature,
    #[error("no webhook secret configured for `{target}` (expected in {variable})")]
    SecretNotConfigured { target: String, variable: String },
    #[error("signature does not match request body")]
    SignatureMismatch,
}

/// Authenticates a delivery for `target_id`.
///
/// Checks run in order: target exists, header present, secret configured,
/// HMAC-SHA256 of `body` matches. The digest comparison is constant-time.
pub fn verify(
    config: &Config,
    secrets: &Secrets,
    target_id: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), VerifyError> {
    if config.target(target_id).is_none() {
        return Err(VerifyError::UnknownTarget(target_id.to_string()));
    }

    let signature = signature.ok_or(VerifyError::MissingSignature)?;

    let secret = secrets
        .secret_for(target_id)
        .ok_or_else(|| VerifyError::SecretNotConfigured {
            target: target_id.to_string(),
            variable: secrets.variable_name(target_id),
        })?;

    let digest = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or(VerifyError::SignatureMismatch)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerifyError::SignatureMismatch)?;
    mac.update(body);
    mac.verify_slice(&digest)
        .map_err(|_| VerifyError::SignatureMismatch)
}

/// Produces the header value a sender holding `secret` would attach to `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take a key of any size");
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}
