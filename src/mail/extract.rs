//! Body extraction: picks one displayable text payload from a Part tree.
//!
//! The walk is depth-first and left-to-right. The first part that is
//! `text/html` or `text/plain` with inline data wins, so tree position, not
//! media type, decides between HTML and plain text at different depths.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use super::Part;
use crate::error::MailError;

/// Gmail body data is base64url; padding shows up inconsistently.
const GMAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Extract the message body from the root part.
///
/// A root carrying inline data is returned as-is regardless of its media
/// type. Otherwise children are searched as described in the module docs.
/// `Ok(None)` means no text body was found.
pub fn extract_body(root: &Part) -> Result<Option<String>, MailError> {
    if let Some(data) = root.inline_data() {
        return decode_body_data(data, &root.mime_type).map(Some);
    }
    find_text_part(&root.parts)
}

fn find_text_part(parts: &[Part]) -> Result<Option<String>, MailError> {
    for part in parts {
        if let Some(data) = part.inline_data()
            && (part.mime_type == "text/html" || part.mime_type == "text/plain")
        {
            return decode_body_data(data, &part.mime_type).map(Some);
        }

        if part.has_children()
            && let Some(nested) = find_text_part(&part.parts)?
            && !nested.is_empty()
        {
            return Ok(Some(nested));
        }
    }
    Ok(None)
}

/// Decode a base64url body into text.
///
/// Standard-alphabet characters are tolerated and invalid UTF-8 is
/// replaced rather than rejected.
pub fn decode_body_data(data: &str, mime_type: &str) -> Result<String, MailError> {
    let normalized: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let bytes = GMAIL_BASE64
        .decode(normalized.as_bytes())
        .map_err(|e| MailError::BodyDecode {
            mime_type: mime_type.to_string(),
            reason: e.to_string(),
        })?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
