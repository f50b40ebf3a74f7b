//! URL-safe base64 used for the email/token pair carried in email links.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

pub fn encode_url(value: &str) -> String {
    URL_SAFE_NO_PAD.encode(value.as_bytes())
}

/// Decode a link parameter. Padded and unpadded input are both accepted;
/// anything that is not base64url or not UTF-8 yields `None`.
pub fn decode_url(encoded: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .ok()?;
    String::from_utf8(bytes).ok()
}
