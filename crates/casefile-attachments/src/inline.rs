use base64::{engine::general_purpose, Engine as _};

use crate::error::{AttachmentError, AttachmentResult};

const DEFAULT_MIME: &str = "application/octet-stream";

/// Bytes carried inline in a `data:` URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlinePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InlinePayload {
    /// Parse `data:[<mime>][;base64],<data>`.
    ///
    /// Only base64 payloads are accepted; captures are always encoded that way.
    pub fn parse(uri: &str) -> AttachmentResult<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| AttachmentError::InvalidInline("missing data: scheme".into()))?;
        let (meta, data) = rest
            .split_once(',')
            .ok_or_else(|| AttachmentError::InvalidInline("missing ',' separator".into()))?;

        let mut parts = meta.split(';');
        let mime = parts.next().unwrap_or_default();
        if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(AttachmentError::InvalidInline(
                "only base64 payloads are supported".into(),
            ));
        }

        let bytes = general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| AttachmentError::InvalidInline(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AttachmentError::InvalidInline("empty payload".into()));
        }

        Ok(Self {
            mime_type: if mime.is_empty() { DEFAULT_MIME } else { mime }.to_string(),
            bytes,
        })
    }

    /// Render as a base64 `data:` URI.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// File extension conventionally used for the payload's mime type.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "application/pdf" => "pdf",
        "video/mp4" => "mp4",
        "text/plain" => "txt",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base64_image() {
        let p = InlinePayload::parse("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(p.mime_type, "image/png");
        assert_eq!(p.bytes, b"hello");
        assert_eq!(p.extension(), "png");
    }

    #[test]
    fn missing_mime_defaults() {
        let p = InlinePayload::parse("data:;base64,aGVsbG8=").unwrap();
        assert_eq!(p.mime_type, "application/octet-stream");
    }

    #[test]
    fn rejects_non_data_uri() {
        assert!(InlinePayload::parse("https://example.com/a.png").is_err());
    }

    #[test]
    fn rejects_plain_text_payload() {
        assert!(InlinePayload::parse("data:text/plain,hello").is_err());
    }

    #[test]
    fn rejects_bad_base64() {
        let err = InlinePayload::parse("data:image/png;base64,!!!").unwrap_err();
        assert!(matches!(err, AttachmentError::InvalidInline(_)));
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(InlinePayload::parse("data:image/png;base64,").is_err());
    }

    #[test]
    fn data_uri_parses_back() {
        let p = InlinePayload {
            mime_type: "image/jpeg".into(),
            bytes: vec![0xff, 0xd8, 0xff],
        };
        assert_eq!(InlinePayload::parse(&p.to_data_uri()).unwrap(), p);
    }
}
