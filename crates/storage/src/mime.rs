//! MIME type detection and normalisation.

use crate::error::{ErrorKind, Result};
use std::path::Path;

/// Guess the MIME type of a file from its extension.
///
/// Returns `None` for files without an extension, or with an extension that
/// isn't known. Content is never read.
pub fn detect(path: impl AsRef<Path>) -> Option<String> {
    mime_guess::from_path(path).first_raw().map(str::to_string)
}

/// Normalise a configured MIME type to its lowercase `type/subtype` essence.
///
/// Parameters (`; charset=...`) are not accepted: the allow-list is compared
/// against detected essences only.
pub fn normalize(mime: impl AsRef<str>) -> Result<String> {
    let raw = mime.as_ref().trim();
    let Some((kind, subtype)) = raw.split_once('/') else {
        exn::bail!(ErrorKind::InvalidMimeType(raw.to_string()));
    };
    let valid = |part: &str| {
        !part.is_empty()
            && part.bytes().all(|b| b.is_ascii_alphanumeric() || b"!#$&-^_.+".contains(&b))
    };
    if !valid(kind) || !valid(subtype) {
        exn::bail!(ErrorKind::InvalidMimeType(raw.to_string()));
    }
    Ok(raw.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/music/song.mp3", Some("audio/mpeg"))]
    #[case("/music/SONG.MP3", Some("audio/mpeg"))]
    #[case("/music/notes.txt", Some("text/plain"))]
    #[case("/music/no-extension", None)]
    #[case("/music/archive.unknownext", None)]
    fn test_detect(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(detect(path).as_deref(), expected);
    }

    #[rstest]
    #[case("audio/mpeg", "audio/mpeg")]
    #[case("  Audio/FLAC ", "audio/flac")]
    #[case("audio/x-ms-wma", "audio/x-ms-wma")]
    #[case("application/vnd.apple.mpegurl", "application/vnd.apple.mpegurl")]
    fn test_normalize_valid(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("audio")]
    #[case("audio/")]
    #[case("/mpeg")]
    #[case("audio/mpeg; charset=utf-8")]
    #[case("audio/mp eg")]
    fn test_normalize_invalid(#[case] input: &str) {
        let err = normalize(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidMimeType(_)));
    }
}
