//! Human-readable rendering of a captured request.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use hooktrap_core::decode::{DecodeError, DecodedBody};
use hooktrap_core::display::{format_size, sanitize_body};
use hooktrap_core::verify::HmacCheck;
use hooktrap_core::CapturedRequest;

const DIVIDER_WIDTH: usize = 80;

/// Verification configuration and outcomes for the payload section.
#[derive(Default)]
pub struct VerifySection<'a> {
    pub secret_token: Option<&'a str>,
    pub secret_token_header: Option<&'a str>,
    pub token_matches: Option<bool>,
    pub hmac_secret: Option<&'a str>,
    pub hmac_header: Option<&'a str>,
    pub hmac: Option<&'a HmacCheck>,
}

pub fn divider() -> String {
    "-".repeat(DIVIDER_WIDTH)
}

fn section_row(table: &mut Table, title: &str) {
    table.add_row(vec![Cell::new(title).add_attribute(Attribute::Bold)]);
}

/// Render the capture table: request metadata, sorted headers,
/// verification rows and the decoded payload (or its decode error).
pub fn render_capture(
    req: &CapturedRequest,
    content_type: &str,
    payload: Option<&Result<DecodedBody, DecodeError>>,
    read_error: Option<&str>,
    verify: &VerifySection<'_>,
) -> String {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Hooktrap").add_attribute(Attribute::Bold),
        Cell::new(format!("v{}", env!("CARGO_PKG_VERSION"))),
    ]);

    table.add_row(vec![Cell::new("Request Time"), Cell::new(req.time.to_rfc3339())]);
    table.add_row(vec![Cell::new("HTTP Method"), Cell::new(&req.method)]);

    section_row(&mut table, "Request Headers");
    for (name, value) in &req.headers {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }

    let has_payload_section =
        payload.is_some() || read_error.is_some() || verify.token_matches.is_some();
    if has_payload_section {
        section_row(&mut table, "Payload");

        if let Some(token) = verify.secret_token {
            table.add_row(vec![Cell::new("Secret Token"), Cell::new(token)]);
        }
        if let Some(name) = verify.secret_token_header {
            table.add_row(vec![Cell::new("Secret Token Header Name"), Cell::new(name)]);
        }
        if let Some(matches) = verify.token_matches {
            table.add_row(vec![Cell::new("Secret Token Matches?"), Cell::new(matches)]);
        }

        if let Some(secret) = verify.hmac_secret {
            table.add_row(vec![Cell::new("HMAC Secret"), Cell::new(secret)]);
        }
        if let Some(name) = verify.hmac_header {
            table.add_row(vec![Cell::new("HMAC Header Name"), Cell::new(name)]);
        }
        if let Some(check) = verify.hmac {
            table.add_row(vec![Cell::new("Incoming Signature"), Cell::new(&check.provided)]);
            table.add_row(vec![Cell::new("Expected Signature"), Cell::new(&check.expected)]);
            table.add_row(vec![Cell::new("Is Valid?"), Cell::new(check.valid)]);
        }

        table.add_row(vec![Cell::new("Incoming"), Cell::new(content_type)]);

        if let Some(err) = read_error {
            table.add_row(vec![Cell::new(format!("read error: {err}"))]);
        }

        match payload {
            Some(Ok(decoded)) => render_payload(&mut table, decoded),
            Some(Err(e)) => {
                table.add_row(vec![Cell::new(e.to_string())]);
            }
            None => {}
        }
    }

    table.to_string()
}

fn render_payload(table: &mut Table, decoded: &DecodedBody) {
    match decoded {
        DecodedBody::Json { pretty } => {
            table.add_row(vec![Cell::new(pretty)]);
        }
        DecodedBody::Form { fields } => {
            section_row(table, "Form Data");
            for (name, values) in fields {
                table.add_row(vec![Cell::new(name), Cell::new(values.join(", "))]);
            }
        }
        DecodedBody::Multipart { fields, files } => {
            if !fields.is_empty() {
                section_row(table, "Form Data");
                for (name, values) in fields {
                    table.add_row(vec![Cell::new(name), Cell::new(values.join(", "))]);
                }
            }
            if !files.is_empty() {
                section_row(table, "Files");
                for file in files {
                    table.add_row(vec![Cell::new(format!(
                        "{} | {} | {}",
                        file.filename,
                        format_size(file.size),
                        file.content_type
                    ))]);
                    if let Some(content) = &file.content {
                        table.add_row(vec![Cell::new(content)]);
                    }
                }
            }
        }
        DecodedBody::Raw { text } => {
            table.add_row(vec![Cell::new(text)]);
        }
    }
}

/// Reconstruct the request in raw wire shape with a sanitized body.
pub fn render_raw_request(req: &CapturedRequest, content_type: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {} {}\n", req.method, req.url, req.proto));
    out.push_str(&format!("Host: {}\n", req.host));
    for (name, value) in &req.headers {
        out.push_str(&format!("{name}: {value}\n"));
    }
    if !req.body.is_empty() {
        out.push('\n');
        out.push_str(&sanitize_body(&req.body, content_type));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn sample_request() -> CapturedRequest {
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "*/*".to_string());
        headers.insert("X-Tag".to_string(), "a,b".to_string());
        CapturedRequest {
            id: "r1".to_string(),
            time: Utc::now(),
            method: "POST".to_string(),
            url: "/hook".to_string(),
            headers,
            body: "{\"k\":1}".to_string(),
            host: "localhost:9002".to_string(),
            proto: "HTTP/1.1".to_string(),
            files: Vec::new(),
        }
    }

    #[test]
    fn table_includes_method_and_headers() {
        let req = sample_request();
        let payload = Ok(DecodedBody::Raw {
            text: req.body.clone(),
        });
        let rendered = render_capture(
            &req,
            "application/json",
            Some(&payload),
            None,
            &VerifySection::default(),
        );

        assert!(rendered.contains("POST"));
        assert!(rendered.contains("Accept"));
        assert!(rendered.contains("X-Tag"));
        assert!(rendered.contains("application/json"));
    }

    #[test]
    fn decode_error_renders_inline() {
        let req = sample_request();
        let payload: Result<DecodedBody, DecodeError> =
            Err(DecodeError::MissingBoundary);
        let rendered = render_capture(
            &req,
            "multipart/form-data",
            Some(&payload),
            None,
            &VerifySection::default(),
        );
        assert!(rendered.contains("multipart boundary not found"));
    }

    #[test]
    fn raw_reconstruction_has_request_line_and_sorted_headers() {
        let req = sample_request();
        let raw = render_raw_request(&req, "application/json");

        assert!(raw.starts_with("POST /hook HTTP/1.1\n"));
        assert!(raw.contains("Host: localhost:9002\n"));
        let accept = raw.find("Accept:").unwrap();
        let tag = raw.find("X-Tag:").unwrap();
        assert!(accept < tag);
        assert!(raw.ends_with("{\"k\":1}\n"));
    }
}
