//! Text wrap between packet bytes and QR symbols.
//!
//! QR libraries and scanners on both ends of the channel treat symbol
//! contents as text, so arbitrary packet bytes must ride inside a
//! binary-safe textual encoding. Standard base64 is used; any base-N
//! encoding would do provided both endpoints agree.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::errors::{ProtocolError, Result};

/// Wrap packet bytes for the visual channel.
#[must_use]
pub fn to_visual(packet: &[u8]) -> String {
    STANDARD.encode(packet)
}

/// Unwrap a scanned QR payload back into packet bytes.
///
/// # Errors
///
/// `ProtocolError::MalformedVisual` if the payload is not valid base64 -
/// typically a misread symbol or a stray QR code in the camera's view.
pub fn from_visual(payload: &[u8]) -> Result<Vec<u8>> {
    STANDARD
        .decode(payload)
        .map_err(|e| ProtocolError::MalformedVisual(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_is_ascii() {
        let wrapped = to_visual(&[0x00, 0x7f, 0x80, 0xff]);
        assert!(wrapped.is_ascii());
    }

    #[test]
    fn roundtrip_preserves_high_bytes() {
        let bytes: Vec<u8> = (0..=255).collect();
        assert_eq!(from_visual(to_visual(&bytes).as_bytes()).unwrap(), bytes);
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            from_visual(b"not base64!!"),
            Err(ProtocolError::MalformedVisual(_))
        ));
    }
}
