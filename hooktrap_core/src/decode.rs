//! Content-type-aware body decoding under strict memory caps.
//!
//! The decoder turns a raw body plus its declared `Content-Type` into a
//! tagged result per content-type branch. Failures are display-only:
//! the capture pipeline renders them and carries on, and the HTTP
//! response to the caller is never affected.

use crate::store::FileAttachment;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;

/// Largest image attachment that keeps a base64 preview
pub const IMAGE_PREVIEW_CAP: usize = 5 << 20;

/// Largest text-like attachment that keeps its content inline
pub const TEXT_PREVIEW_CAP: usize = 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("form parse error: {0}")]
    Form(String),
    #[error("media type parse error: {0}")]
    MediaType(String),
    #[error("multipart boundary not found")]
    MissingBoundary,
    #[error("multipart read error: {0}")]
    Multipart(#[from] multer::Error),
}

/// How much of a multipart file part is worth buffering in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// `image/*`: buffer up to [`IMAGE_PREVIEW_CAP`] for a dashboard preview
    Image,
    /// Recognized textual types: buffer up to [`TEXT_PREVIEW_CAP`]
    Text,
    /// Anything else: count bytes, keep nothing
    Opaque,
}

const TEXT_TYPES: &[&str] = &[
    "text/",
    "application/json",
    "application/xml",
    "application/javascript",
    "application/x-www-form-urlencoded",
];

impl BufferPolicy {
    /// Classify a part's declared content type. Kept separate from the
    /// parsing call sites so the cap logic is testable in isolation.
    pub fn classify(content_type: &str) -> Self {
        let ct = content_type.to_ascii_lowercase();
        if ct.starts_with("image/") {
            Self::Image
        } else if TEXT_TYPES.iter().any(|t| ct.starts_with(t)) {
            Self::Text
        } else {
            Self::Opaque
        }
    }

    pub fn cap(self) -> usize {
        match self {
            Self::Image => IMAGE_PREVIEW_CAP,
            Self::Text => TEXT_PREVIEW_CAP,
            Self::Opaque => 0,
        }
    }
}

/// A file part extracted from a multipart body.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field_name: String,
    pub filename: String,
    pub content_type: String,
    /// Full part size, not just what was buffered
    pub size: usize,
    /// Inline textual preview, only when the whole part fits the text cap
    pub content: Option<String>,
    /// Raw preview bytes, only for images within the image cap
    pub data: Option<Vec<u8>>,
}

impl FilePart {
    /// Convert to the store representation, base64-encoding any image
    /// preview bytes.
    pub fn into_attachment(self) -> FileAttachment {
        let data = self.data.map(|bytes| BASE64.encode(bytes));
        FileAttachment {
            field_name: self.field_name,
            filename: self.filename,
            content_type: self.content_type,
            size: self.size,
            data,
        }
    }
}

/// Structured decode result, one variant per content-type branch.
#[derive(Debug)]
pub enum DecodedBody {
    /// `application/json`, re-serialized with 4-space indentation
    Json { pretty: String },
    /// `application/x-www-form-urlencoded`: key -> ordered values
    Form { fields: Vec<(String, Vec<String>)> },
    /// `multipart/form-data`: plain fields plus file parts
    Multipart {
        fields: Vec<(String, Vec<String>)>,
        files: Vec<FilePart>,
    },
    /// Anything else, shown verbatim
    Raw { text: String },
}

/// Decode `body` according to its declared content type.
pub async fn decode_body(content_type: &str, body: Bytes) -> Result<DecodedBody, DecodeError> {
    if content_type == "application/json" {
        decode_json(&body)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        decode_form(&body)
    } else if content_type.starts_with("multipart/form-data") {
        decode_multipart(content_type, body).await
    } else {
        Ok(DecodedBody::Raw {
            text: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

fn decode_json(body: &[u8]) -> Result<DecodedBody, DecodeError> {
    // preserve_order keeps the document's key order in the output.
    // Only objects count as decoded JSON: arrays and scalars fail the
    // map deserialization and surface as decode errors.
    let value: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(body)?;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;

    Ok(DecodedBody::Json {
        pretty: String::from_utf8_lossy(&buf).into_owned(),
    })
}

fn decode_form(body: &[u8]) -> Result<DecodedBody, DecodeError> {
    check_percent_escapes(body)?;

    let mut fields: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in form_urlencoded::parse(body) {
        match fields.iter_mut().find(|(name, _)| *name == key) {
            Some((_, values)) => values.push(value.into_owned()),
            None => fields.push((key.into_owned(), vec![value.into_owned()])),
        }
    }

    Ok(DecodedBody::Form { fields })
}

// form_urlencoded decodes leniently; reject broken escapes up front so
// malformed bodies surface as decode errors instead of mojibake.
fn check_percent_escapes(body: &[u8]) -> Result<(), DecodeError> {
    let mut i = 0;
    while i < body.len() {
        if body[i] == b'%' {
            match (body.get(i + 1), body.get(i + 2)) {
                (Some(a), Some(b)) if a.is_ascii_hexdigit() && b.is_ascii_hexdigit() => {}
                (Some(_), Some(_)) => {
                    return Err(DecodeError::Form(format!(
                        "invalid percent escape at offset {i}"
                    )))
                }
                _ => return Err(DecodeError::Form("truncated percent escape".to_string())),
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

async fn decode_multipart(content_type: &str, body: Bytes) -> Result<DecodedBody, DecodeError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|e: mime::FromStrError| DecodeError::MediaType(e.to_string()))?;
    let boundary = media_type
        .get_param(mime::BOUNDARY)
        .ok_or(DecodeError::MissingBoundary)?
        .to_string();

    let stream = futures_util::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields: Vec<(String, Vec<String>)> = Vec::new();
    let mut files: Vec<FilePart> = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(|name| name.to_string());
        let content_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_default();

        match filename {
            None => {
                // Plain form field, typically small: read it whole.
                let value = field.text().await?;
                match fields.iter_mut().find(|(name, _)| *name == field_name) {
                    Some((_, values)) => values.push(value),
                    None => fields.push((field_name, vec![value])),
                }
            }
            Some(filename) => {
                let policy = BufferPolicy::classify(&content_type);
                let cap = policy.cap();

                // Buffer up to the cap, then drain the rest keeping
                // only the running count. Total size must reflect the
                // full part, not just the preview.
                let mut preview: Vec<u8> = Vec::new();
                let mut size = 0usize;
                while let Some(chunk) = field.chunk().await? {
                    size += chunk.len();
                    if preview.len() < cap {
                        let take = (cap - preview.len()).min(chunk.len());
                        preview.extend_from_slice(&chunk[..take]);
                    }
                }

                let content = (policy == BufferPolicy::Text && size <= TEXT_PREVIEW_CAP)
                    .then(|| String::from_utf8_lossy(&preview).into_owned());
                let data =
                    (policy == BufferPolicy::Image && size <= IMAGE_PREVIEW_CAP).then_some(preview);

                files.push(FilePart {
                    field_name,
                    filename,
                    content_type,
                    size,
                    content,
                    data: data.filter(|d| !d.is_empty()),
                });
            }
        }
    }

    Ok(DecodedBody::Multipart { fields, files })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multipart_body(parts: &[(&str, &[u8])]) -> (String, Bytes) {
        // parts: (headers, content)
        let boundary = "xXBOUNDARYXx";
        let mut body: Vec<u8> = Vec::new();
        for (headers, content) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n{headers}\r\n\r\n").as_bytes());
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        (
            format!("multipart/form-data; boundary={boundary}"),
            Bytes::from(body),
        )
    }

    #[tokio::test]
    async fn json_pretty_prints_with_four_space_indent() {
        let body = Bytes::from(r#"{"name":"deploy","count":2}"#);
        let decoded = decode_body("application/json", body).await.unwrap();

        match decoded {
            DecodedBody::Json { pretty } => {
                assert!(pretty.contains("    \"name\": \"deploy\""));
                assert!(pretty.contains("    \"count\": 2"));
            }
            other => panic!("expected json, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_reports_decode_error() {
        let result = decode_body("application/json", Bytes::from(r#"{"a":"#)).await;
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[tokio::test]
    async fn non_object_json_reports_decode_error() {
        for body in ["[1,2,3]", "42", "\"text\"", "null", "true"] {
            let result = decode_body("application/json", Bytes::from(body)).await;
            assert!(
                matches!(result, Err(DecodeError::Json(_))),
                "{body} should not decode as JSON"
            );
        }
    }

    #[tokio::test]
    async fn form_keeps_value_order_and_duplicates() {
        let decoded = decode_body(
            "application/x-www-form-urlencoded; charset=utf-8",
            Bytes::from("a=1&a=2&b=x"),
        )
        .await
        .unwrap();

        match decoded {
            DecodedBody::Form { fields } => {
                assert_eq!(
                    fields,
                    vec![
                        ("a".to_string(), vec!["1".to_string(), "2".to_string()]),
                        ("b".to_string(), vec!["x".to_string()]),
                    ]
                );
            }
            other => panic!("expected form, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn broken_percent_escape_is_a_form_error() {
        let result =
            decode_body("application/x-www-form-urlencoded", Bytes::from("a=%zz")).await;
        assert!(matches!(result, Err(DecodeError::Form(_))));

        let result = decode_body("application/x-www-form-urlencoded", Bytes::from("a=%2")).await;
        assert!(matches!(result, Err(DecodeError::Form(_))));
    }

    #[tokio::test]
    async fn unknown_content_type_passes_through_verbatim() {
        let decoded = decode_body("application/octet-stream", Bytes::from("hello"))
            .await
            .unwrap();
        match decoded {
            DecodedBody::Raw { text } => assert_eq!(text, "hello"),
            other => panic!("expected raw, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_boundary_is_reported() {
        let result = decode_body("multipart/form-data", Bytes::from("x")).await;
        assert!(matches!(result, Err(DecodeError::MissingBoundary)));
    }

    #[tokio::test]
    async fn multipart_splits_fields_and_files() {
        let (ct, body) = multipart_body(&[
            (
                "Content-Disposition: form-data; name=\"env\"",
                b"production",
            ),
            ("Content-Disposition: form-data; name=\"env\"", b"staging"),
            (
                "Content-Disposition: form-data; name=\"notes\"; filename=\"notes.txt\"\r\nContent-Type: text/plain",
                b"release notes",
            ),
        ]);

        let decoded = decode_body(&ct, body).await.unwrap();
        match decoded {
            DecodedBody::Multipart { fields, files } => {
                assert_eq!(
                    fields,
                    vec![(
                        "env".to_string(),
                        vec!["production".to_string(), "staging".to_string()]
                    )]
                );
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].field_name, "notes");
                assert_eq!(files[0].filename, "notes.txt");
                assert_eq!(files[0].size, 13);
                assert_eq!(files[0].content.as_deref(), Some("release notes"));
                assert!(files[0].data.is_none());
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_file_over_cap_keeps_size_but_drops_content() {
        let big = vec![b'a'; TEXT_PREVIEW_CAP + 1];
        let (ct, body) = multipart_body(&[(
            "Content-Disposition: form-data; name=\"f\"; filename=\"big.txt\"\r\nContent-Type: text/plain",
            &big,
        )]);

        let decoded = decode_body(&ct, body).await.unwrap();
        match decoded {
            DecodedBody::Multipart { files, .. } => {
                assert_eq!(files[0].size, TEXT_PREVIEW_CAP + 1);
                assert!(files[0].content.is_none());
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn image_at_cap_keeps_preview_one_byte_over_does_not() {
        for (extra, expect_data) in [(0usize, true), (1usize, false)] {
            let payload = vec![0x89u8; IMAGE_PREVIEW_CAP + extra];
            let (ct, body) = multipart_body(&[(
                "Content-Disposition: form-data; name=\"img\"; filename=\"shot.png\"\r\nContent-Type: image/png",
                &payload,
            )]);

            let decoded = decode_body(&ct, body).await.unwrap();
            match decoded {
                DecodedBody::Multipart { files, .. } => {
                    assert_eq!(files[0].size, IMAGE_PREVIEW_CAP + extra);
                    assert_eq!(files[0].data.is_some(), expect_data);
                    if let Some(data) = &files[0].data {
                        assert_eq!(data.len(), IMAGE_PREVIEW_CAP);
                    }
                }
                other => panic!("expected multipart, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn opaque_file_buffers_nothing() {
        let payload = vec![0u8; 4096];
        let (ct, body) = multipart_body(&[(
            "Content-Disposition: form-data; name=\"bin\"; filename=\"blob\"\r\nContent-Type: application/octet-stream",
            &payload,
        )]);

        let decoded = decode_body(&ct, body).await.unwrap();
        match decoded {
            DecodedBody::Multipart { files, .. } => {
                assert_eq!(files[0].size, 4096);
                assert!(files[0].content.is_none());
                assert!(files[0].data.is_none());
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn classification_matches_buffering_policy() {
        assert_eq!(BufferPolicy::classify("image/png"), BufferPolicy::Image);
        assert_eq!(BufferPolicy::classify("IMAGE/JPEG"), BufferPolicy::Image);
        assert_eq!(
            BufferPolicy::classify("text/plain; charset=utf-8"),
            BufferPolicy::Text
        );
        assert_eq!(
            BufferPolicy::classify("application/json"),
            BufferPolicy::Text
        );
        assert_eq!(
            BufferPolicy::classify("application/octet-stream"),
            BufferPolicy::Opaque
        );
        assert_eq!(BufferPolicy::Opaque.cap(), 0);
        assert_eq!(BufferPolicy::Text.cap(), 1024);
        assert_eq!(BufferPolicy::Image.cap(), 5 << 20);
    }

    #[test]
    fn image_attachment_is_base64_encoded() {
        let part = FilePart {
            field_name: "img".to_string(),
            filename: "a.png".to_string(),
            content_type: "image/png".to_string(),
            size: 3,
            content: None,
            data: Some(vec![1, 2, 3]),
        };
        let attachment = part.into_attachment();
        assert_eq!(attachment.data.as_deref(), Some("AQID"));
    }
}
