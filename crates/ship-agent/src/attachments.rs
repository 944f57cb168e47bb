//! Data-URL attachment decoding

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use ship_core::{Attachment, Result, ShipError};
use tracing::warn;

/// An attachment whose payload decoded to text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAttachment {
    pub name: String,
    pub content: String,
}

/// Decode `<header>,<base64-payload>` into UTF-8 text
pub fn decode_data_url(url: &str) -> Result<String> {
    let (_header, payload) = url
        .split_once(',')
        .ok_or_else(|| ShipError::Validation("data URL has no ',' separator".to_string()))?;
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64_STANDARD
        .decode(compact)
        .map_err(|e| ShipError::Validation(format!("invalid base64 payload: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| ShipError::Validation(format!("payload is not UTF-8 text: {}", e)))
}

/// Decode every attachment, skipping (and logging) the ones that fail
pub fn decode_attachments(attachments: &[Attachment]) -> Vec<DecodedAttachment> {
    attachments
        .iter()
        .filter_map(|attachment| match decode_data_url(&attachment.url) {
            Ok(content) => Some(DecodedAttachment {
                name: attachment.name.clone(),
                content,
            }),
            Err(e) => {
                warn!("Could not decode attachment {}: {}", attachment.name, e);
                None
            }
        })
        .collect()
}
