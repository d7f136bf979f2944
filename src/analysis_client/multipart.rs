//! `multipart/form-data` encoding for a single file field.

use uuid::Uuid;

/// Encoded request body plus the matching `Content-Type` header value.
#[derive(Debug)]
pub(crate) struct MultipartBody {
    pub(crate) content_type: String,
    pub(crate) bytes: Vec<u8>,
}

/// Encode `content` as the only part of a form, under `field`.
pub(crate) fn encode_file_field(field: &str, file_name: &str, content: &[u8]) -> MultipartBody {
    let boundary = format!("statlink-{}", Uuid::new_v4().simple());
    encode_with_boundary(&boundary, field, file_name, content)
}

fn encode_with_boundary(
    boundary: &str,
    field: &str,
    file_name: &str,
    content: &[u8],
) -> MultipartBody {
    let header = format!(
        "--{boundary}\r\n\
Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
Content-Type: text/csv\r\n\r\n",
        quote_safe(field),
        quote_safe(file_name)
    );
    let footer = format!("\r\n--{boundary}--\r\n");
    let mut bytes = Vec::with_capacity(header.len() + content.len() + footer.len());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(content);
    bytes.extend_from_slice(footer.as_bytes());
    MultipartBody {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        bytes,
    }
}

fn quote_safe(value: &str) -> String {
    value
        .chars()
        .filter(|ch| *ch != '\r' && *ch != '\n')
        .map(|ch| if ch == '"' { '\'' } else { ch })
        .collect()
}
