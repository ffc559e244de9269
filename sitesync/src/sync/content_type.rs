use std::path::Path;

use tokio::io::AsyncReadExt;

use super::error::SyncError;

/// How many leading bytes are inspected when the extension is not conclusive.
pub const SNIFF_LEN: u64 = 512;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Content type for an upload: the extension table first, then a sniff of
/// the file's first [`SNIFF_LEN`] bytes.
pub async fn resolve_content_type(path: &Path) -> Result<&'static str, SyncError> {
    if let Some(content_type) = by_extension(path) {
        return Ok(content_type);
    }

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|err| SyncError::local_io(path, err))?;
    let mut sample = Vec::with_capacity(SNIFF_LEN as usize);
    file.take(SNIFF_LEN)
        .read_to_end(&mut sample)
        .await
        .map_err(|err| SyncError::local_io(path, err))?;
    Ok(sniff(&sample))
}

pub fn by_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "text/xml; charset=utf-8",
        "txt" | "text" => TEXT_PLAIN,
        "md" => "text/markdown; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/vnd.microsoft.icon",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => return None,
    };
    Some(content_type)
}

const HTML_PREFIXES: [&[u8]; 17] = [
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

pub fn sniff(sample: &[u8]) -> &'static str {
    let sample = &sample[..sample.len().min(SNIFF_LEN as usize)];

    let trimmed = trim_leading_whitespace(sample);
    if HTML_PREFIXES
        .iter()
        .any(|prefix| starts_with_tag(trimmed, prefix))
    {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    let signatures: [(&[u8], &'static str); 9] = [
        (b"%PDF-", "application/pdf"),
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b\x08", "application/x-gzip"),
        (b"\x00asm", "application/wasm"),
        (b"\x00\x00\x01\x00", "image/x-icon"),
    ];
    if let Some((_, content_type)) = signatures
        .iter()
        .find(|(signature, _)| sample.starts_with(signature))
    {
        return *content_type;
    }
    if sample.len() >= 12 && &sample[..4] == b"RIFF" && &sample[8..12] == b"WEBP" {
        return "image/webp";
    }

    if sample.iter().any(|byte| is_binary_byte(*byte)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn trim_leading_whitespace(sample: &[u8]) -> &[u8] {
    let start = sample
        .iter()
        .position(|byte| !matches!(byte, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(sample.len());
    &sample[start..]
}

// HTML markers match case-insensitively and must be followed by a space or `>`.
fn starts_with_tag(sample: &[u8], prefix: &[u8]) -> bool {
    if sample.len() < prefix.len() + 1 {
        return false;
    }
    let (head, rest) = sample.split_at(prefix.len());
    head.eq_ignore_ascii_case(prefix) && matches!(rest[0], b' ' | b'>')
}

fn is_binary_byte(byte: u8) -> bool {
    matches!(byte, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f)
}
