use std::fmt;

use crate::error::{PipelineTypeError, Result};

/// The three-way failure taxonomy from spec §7.
///
/// This is the domain-level classification every worker attaches to a
/// failure before handing it to [`crate::Site`]'s `last_error_*` fields; it
/// is deliberately a closed, serializable enum rather than a free-form
/// string so the dispatch rules in spec §7 ("transient never leaks to
/// counters", "permanent always advances counters", "critical always fails
/// coordinators") are checked by the type system at the call sites that
/// route on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorClass {
    /// Network timeouts, protocol resets, transient I/O — the queue retries.
    Transient,
    /// Corrupted input, parse failures, non-zero OCR exit — counters
    /// advance, the site keeps moving.
    Permanent,
    /// Missing storage root, permission denied, misconfiguration — blocks
    /// fan-in, surfaced to a human by the reconciler.
    Critical,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Permanent => "permanent",
            ErrorClass::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "transient" => Ok(ErrorClass::Transient),
            "permanent" => Ok(ErrorClass::Permanent),
            "critical" => Ok(ErrorClass::Critical),
            other => Err(PipelineTypeError::Parse(format!("invalid error class: {other}"))),
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The closed set of error fingerprints from spec §7, used to group
/// semantically identical failures for downstream aggregation. Derived by
/// pattern-matching the error message text, never from a stack trace.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorFingerprint {
    PdfFailedToRead,
    PdfFailedToProcess,
    PdfFileNotFound,
    NoTextFilesFound,
    ErrorFetchingYear,
    FetchError { domain: String },
    OcrCoordinatorFailed,
    EmptyPdfFile,
    FileNotFound { kind: FileKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FileKind {
    Pdf,
    Txt,
    Other,
}

impl fmt::Display for ErrorFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorFingerprint::PdfFailedToRead => write!(f, "pdf-failed-to-read"),
            ErrorFingerprint::PdfFailedToProcess => write!(f, "pdf-failed-to-process"),
            ErrorFingerprint::PdfFileNotFound => write!(f, "pdf-file-not-found"),
            ErrorFingerprint::NoTextFilesFound => write!(f, "no-text-files-found"),
            ErrorFingerprint::ErrorFetchingYear => write!(f, "error-fetching-year"),
            ErrorFingerprint::FetchError { domain } => write!(f, "fetch-error:{domain}"),
            ErrorFingerprint::OcrCoordinatorFailed => write!(f, "ocr-coordinator-failed"),
            ErrorFingerprint::EmptyPdfFile => write!(f, "empty-pdf-file"),
            ErrorFingerprint::FileNotFound { kind } => {
                let kind = match kind {
                    FileKind::Pdf => "pdf",
                    FileKind::Txt => "txt",
                    FileKind::Other => "other",
                };
                write!(f, "file-not-found:{kind}")
            }
        }
    }
}

/// Truncate `"{error_class}: {message}"` to the 500-byte bound spec §4.1
/// places on `last_error_message`, without splitting a UTF-8 codepoint.
pub fn truncate_error_message(error_class: &str, message: &str) -> String {
    let combined = format!("{error_class}: {message}");
    const LIMIT: usize = 500;
    if combined.len() <= LIMIT {
        return combined;
    }
    let mut end = LIMIT;
    while !combined.is_char_boundary(end) {
        end -= 1;
    }
    combined[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_class_round_trips_through_str() {
        for class in [ErrorClass::Transient, ErrorClass::Permanent, ErrorClass::Critical] {
            assert_eq!(ErrorClass::from_str(class.as_str()).unwrap(), class);
        }
    }

    #[test]
    fn fingerprint_display_matches_spec_strings() {
        assert_eq!(ErrorFingerprint::PdfFailedToRead.to_string(), "pdf-failed-to-read");
        assert_eq!(
            ErrorFingerprint::FetchError { domain: "example.org".to_string() }.to_string(),
            "fetch-error:example.org"
        );
        assert_eq!(
            ErrorFingerprint::FileNotFound { kind: FileKind::Pdf }.to_string(),
            "file-not-found:pdf"
        );
    }

    #[test]
    fn truncate_error_message_respects_500_byte_bound() {
        let long = "x".repeat(600);
        let truncated = truncate_error_message("PdfReadError", &long);
        assert!(truncated.len() <= 500);
        assert!(truncated.starts_with("PdfReadError: "));
    }

    #[test]
    fn truncate_error_message_leaves_short_messages_untouched() {
        let truncated = truncate_error_message("PdfReadError", "file is corrupt");
        assert_eq!(truncated, "PdfReadError: file is corrupt");
    }
}
