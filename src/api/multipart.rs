//! Minimal `multipart/form-data` decoding for buffered request bodies.

use anyhow::{anyhow, Result};

/// One decoded form field.
#[derive(Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for FormPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormPart")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl FormPart {
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Extract the boundary from a `multipart/form-data` content type.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let media_type = params.next()?.trim();
    if !media_type.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    params
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
}

/// Split `body` into its parts.
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<FormPart>> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let mut close = b"\r\n".to_vec();
    close.extend_from_slice(&delimiter);

    let mut pos = find(body, &delimiter, 0)
        .ok_or_else(|| anyhow!("multipart body missing opening boundary"))?
        + delimiter.len();
    let mut parts = Vec::new();

    loop {
        if body[pos..].starts_with(b"--") {
            return Ok(parts);
        }
        if !body[pos..].starts_with(b"\r\n") {
            return Err(anyhow!("malformed multipart boundary line"));
        }
        pos += 2;

        let head_end = find(body, b"\r\n\r\n", pos)
            .ok_or_else(|| anyhow!("multipart part headers not terminated"))?;
        let head = String::from_utf8_lossy(&body[pos..head_end]);
        let data_start = head_end + 4;
        let data_end = find(body, &close, data_start)
            .ok_or_else(|| anyhow!("multipart part not terminated"))?;

        if let Some(part) = parse_part(&head, &body[data_start..data_end]) {
            parts.push(part);
        }
        pos = data_end + close.len();
    }
}

fn parse_part(head: &str, data: &[u8]) -> Option<FormPart> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in head.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                if let Some((k, v)) = param.split_once('=') {
                    let v = v.trim().trim_matches('"').to_string();
                    match k.trim().to_ascii_lowercase().as_str() {
                        "name" => name = Some(v),
                        "filename" => filename = Some(v),
                        _ => {}
                    }
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }
    Some(FormPart {
        name: name?,
        filename,
        content_type,
        data: data.to_vec(),
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|idx| idx + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "----gaia7MA4YWxk";

    fn body() -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"------gaia7MA4YWxk\r\n");
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"camera\"\r\n\r\n");
        body.extend_from_slice(b"north\r\n");
        body.extend_from_slice(b"------gaia7MA4YWxk\r\n");
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"image\"; filename=\"frame.jpg\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
        body.extend_from_slice(&[0xFF, 0xD8, b'\r', b'\n', 0x00, 0xFF, 0xD9]);
        body.extend_from_slice(b"\r\n------gaia7MA4YWxk--\r\n");
        body
    }

    #[test]
    fn boundary_is_extracted() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=----gaia7MA4YWxk"),
            Some(BOUNDARY.to_string())
        );
        assert_eq!(
            boundary_from_content_type("Multipart/Form-Data; charset=utf-8; boundary=\"abc\""),
            Some("abc".to_string())
        );
        assert_eq!(boundary_from_content_type("application/json"), None);
        assert_eq!(boundary_from_content_type("multipart/form-data"), None);
    }

    #[test]
    fn parses_text_and_file_parts() {
        let parts = parse(&body(), BOUNDARY).unwrap();
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].name, "camera");
        assert!(!parts[0].is_file());
        assert_eq!(parts[0].text(), "north");

        assert_eq!(parts[1].name, "image");
        assert_eq!(parts[1].filename.as_deref(), Some("frame.jpg"));
        assert_eq!(parts[1].content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(parts[1].data, vec![0xFF, 0xD8, b'\r', b'\n', 0x00, 0xFF, 0xD9]);
    }

    #[test]
    fn empty_form_has_no_parts() {
        let parts = parse(b"------gaia7MA4YWxk--\r\n", BOUNDARY).unwrap();
        assert!(parts.is_empty());
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut truncated = body();
        truncated.truncate(60);
        assert!(parse(&truncated, BOUNDARY).is_err());
        assert!(parse(b"no boundary here", BOUNDARY).is_err());
    }
}
