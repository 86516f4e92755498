//! `Content-Disposition` filename extraction
//!
//! Prefers the RFC 5987 extended parameter (`filename*=UTF-8''<pct-encoded>`)
//! over the plain `filename=` parameter. The result is always a bare file name
//! with no path components.

/// Name used when the response carries no usable filename.
pub const FALLBACK_FILENAME: &str = "downloaded_file";

/// Extract a safe filename from a `Content-Disposition` value.
pub fn filename(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in header.split(';').map(str::trim) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => extended = decode_extended(value.trim()),
            "filename" => plain = Some(unquote(value.trim()).to_owned()),
            _ => {}
        }
    }

    extended.or(plain).and_then(|name| sanitize(&name))
}

/// `filename` from the header, or the fallback.
pub fn filename_or_fallback(header: Option<&str>) -> String {
    header
        .and_then(filename)
        .unwrap_or_else(|| FALLBACK_FILENAME.to_owned())
}

/// Decode `charset'lang'pct-encoded`.
fn decode_extended(value: &str) -> Option<String> {
    let value = unquote(value);
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;

    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes.into_owned()).ok()
    } else if charset.eq_ignore_ascii_case("iso-8859-1") {
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn sanitize(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    match base {
        "" | "." | ".." => None,
        _ => Some(base.to_owned()),
    }
}
