//! Image bytes → base64 [`ImageAttachment`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;

use crate::client::ImageAttachment;

/// MIME type from magic bytes; only the formats the model services accept.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(b"\xff\xd8\xff") {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Encode bytes for embedding in a multimodal chat request.
///
/// Unrecognized bytes still get attached (the model rejects them with a
/// clear error if they truly are not an image) under a JPEG label.
pub fn to_attachment(bytes: &[u8]) -> ImageAttachment {
    let mime_type = sniff_mime(bytes).unwrap_or_else(|| {
        warn!(len = bytes.len(), "unrecognized image format, labelling as JPEG");
        "image/jpeg"
    });
    ImageAttachment {
        data: STANDARD.encode(bytes),
        mime_type: mime_type.to_string(),
    }
}
