//! Byte-to-text decoding driven by the declared charset

use super::ExtractionError;

/// How far into the document a `<meta charset>` declaration is searched for
const META_SNIFF_LIMIT: usize = 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Splits a Content-Type header into its lowercase MIME type and charset parameter
pub(crate) fn parse_content_type(content_type: &str) -> (String, Option<String>) {
    let mut parts = content_type.split(';');
    let mime = parts.next().unwrap_or_default().trim().to_ascii_lowercase();

    let charset = parts.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| clean_label(value))
    });

    (mime, charset.filter(|c| !c.is_empty()))
}

/// Looks for `<meta charset=...>` or an http-equiv content type near the start
///
/// Only attributes inside `<meta>` tags count; `charset=` appearing in
/// scripts or text is ignored.
pub(crate) fn sniff_meta_charset(raw: &[u8]) -> Option<String> {
    let head = &raw[..raw.len().min(META_SNIFF_LIMIT)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    head.match_indices("<meta")
        .filter_map(|(start, _)| {
            let tag = &head[start..];
            let tag = &tag[..tag.find('>').unwrap_or(tag.len())];
            charset_attribute(tag)
        })
        .next()
}

fn charset_attribute(tag: &str) -> Option<String> {
    let start = tag.find("charset=")? + "charset=".len();
    let label: String = tag[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        .collect();

    Some(label).filter(|l| !l.is_empty())
}

/// Decodes `raw` using `charset`, defaulting to strict UTF-8
pub(crate) fn decode(raw: &[u8], charset: Option<&str>) -> Result<String, ExtractionError> {
    let label = charset.unwrap_or("utf-8");

    match label {
        // Browsers treat every Latin-1 label as windows-1252
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" | "us-ascii" | "ascii"
        | "windows-1252" | "cp1252" | "x-cp1252" => {
            Ok(raw.iter().map(|&b| windows_1252(b)).collect())
        }
        _ => {
            let bytes = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
            String::from_utf8(bytes.to_vec()).map_err(|e| ExtractionError::Undecodable {
                charset: label.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Code points of windows-1252 bytes 0x80..=0x9F; undefined bytes map to their C1 control
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{81}', '\u{201A}', '\u{192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{2C6}', '\u{2030}', '\u{160}', '\u{2039}', '\u{152}', '\u{8D}', '\u{17D}', '\u{8F}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{2DC}', '\u{2122}', '\u{161}', '\u{203A}', '\u{153}', '\u{9D}', '\u{17E}', '\u{178}',
];

fn windows_1252(byte: u8) -> char {
    match byte {
        0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}

fn clean_label(value: &str) -> String {
    value
        .trim()
        .trim_matches(['"', '\''])
        .to_ascii_lowercase()
}
