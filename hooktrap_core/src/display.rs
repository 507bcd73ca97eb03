//! Display helpers for raw request reconstruction.
//!
//! Arbitrary webhook payloads can contain binary data that would
//! corrupt a terminal or a saved `.raw` file. The sanitizer swaps
//! binary content for a readable placeholder while leaving structure
//! (headers, boundaries) untouched.

/// Human-readable size, base-1024 units.
pub fn format_size(size: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if size >= MB {
        format!("{:.1} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.1} KB", size as f64 / KB as f64)
    } else {
        format!("{size} B")
    }
}

/// Control bytes other than tab/LF/CR mark a payload as binary.
fn contains_binary(s: &str) -> bool {
    s.chars()
        .any(|c| (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r')
}

fn placeholder(len: usize) -> String {
    format!("[binary data: {}]", format_size(len))
}

/// Sanitize a body for raw-request display.
///
/// Non-multipart bodies with binary content are replaced wholesale.
/// Multipart bodies are split on the boundary; only file parts
/// (`filename=` in the part headers) with binary content get the
/// placeholder, and part headers and boundary markers are preserved
/// verbatim.
pub fn sanitize_body(body: &str, content_type: &str) -> String {
    if body.is_empty() {
        return body.to_string();
    }

    if !content_type.contains("multipart/form-data") {
        if contains_binary(body) {
            return placeholder(body.len());
        }
        return body.to_string();
    }

    let boundary = match content_type.parse::<mime::Mime>() {
        Ok(media_type) if media_type.type_() == mime::MULTIPART => {
            match media_type.get_param(mime::BOUNDARY) {
                Some(b) => b.to_string(),
                None => return body.to_string(),
            }
        }
        _ => {
            if contains_binary(body) {
                return placeholder(body.len());
            }
            return body.to_string();
        }
    };

    let marker = format!("--{boundary}");
    let mut result = String::new();

    for (i, part) in body.split(marker.as_str()).enumerate() {
        let trimmed = part.trim();
        if trimmed.is_empty() || trimmed == "--" {
            // Preamble before the first boundary is dropped; the
            // closing marker and epilogue pass through.
            if i == 0 {
                continue;
            }
            result.push_str(&marker);
            result.push_str(part);
            continue;
        }

        let (header_end, separator) = match part.find("\r\n\r\n") {
            Some(pos) => (pos, "\r\n\r\n"),
            None => match part.find("\n\n") {
                Some(pos) => (pos, "\n\n"),
                None => {
                    result.push_str(&marker);
                    result.push_str(part);
                    continue;
                }
            },
        };

        let headers = &part[..header_end];
        let content = &part[header_end + separator.len()..];

        result.push_str(&marker);
        result.push_str(headers);
        result.push_str(separator);

        if headers.contains("filename=") && contains_binary(content) {
            // Size excludes the trailing newline belonging to the
            // boundary framing, which is kept as-is.
            let clean = content
                .strip_suffix("\r\n")
                .or_else(|| content.strip_suffix('\n'))
                .unwrap_or(content);
            result.push_str(&placeholder(clean.len()));
            if content.ends_with("\r\n") {
                result.push_str("\r\n");
            } else if content.ends_with('\n') {
                result.push('\n');
            }
        } else {
            result.push_str(content);
        }
    }

    result
}
