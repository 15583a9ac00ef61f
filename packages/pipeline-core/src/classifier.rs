//! Error classification (spec §7), generalized from the teacher's
//! `classify_error`/`get_current_stage_from_error` string-matching in
//! `orchestrator.rs` from a 2-way to the spec's 3-way taxonomy, and from
//! free text to the closed fingerprint set spec §7 names.
//!
//! Deliberately pattern-matches the error *message*, never a stack trace —
//! spec §7: "Derived by pattern-matching the error message; never from
//! stack traces."

use pipeline_types::{ErrorClass, ErrorFingerprint, FileKind};

/// Classify a worker-surfaced error message into its spec §7 class and, if
/// recognized, a stable fingerprint for aggregation.
pub fn classify(message: &str) -> (ErrorClass, Option<ErrorFingerprint>) {
    let lower = message.to_lowercase();

    if let Some(fingerprint) = fingerprint(&lower, message) {
        let class = match &fingerprint {
            ErrorFingerprint::FetchError { .. } | ErrorFingerprint::OcrCoordinatorFailed => ErrorClass::Critical,
            _ => ErrorClass::Permanent,
        };
        return (class, Some(fingerprint));
    }

    if lower.contains("timeout") || lower.contains("connection reset") || lower.contains("connection refused") {
        return (ErrorClass::Transient, None);
    }

    if lower.contains("permission denied")
        || lower.contains("no such file or directory")
        || lower.contains("storage root")
        || lower.contains("missing binary")
        || lower.contains("misconfigur")
    {
        return (ErrorClass::Critical, None);
    }

    // Default to transient: an unrecognized error is assumed recoverable
    // rather than silently advancing counters or blocking a coordinator.
    (ErrorClass::Transient, None)
}

fn fingerprint(lower: &str, original: &str) -> Option<ErrorFingerprint> {
    if lower.contains("pdffailedtoread") || lower.contains("pdfreaderror") || lower.contains("failed to read") && lower.contains("pdf") {
        return Some(ErrorFingerprint::PdfFailedToRead);
    }
    if lower.contains("failed to process") && lower.contains("pdf") {
        return Some(ErrorFingerprint::PdfFailedToProcess);
    }
    if lower.contains("empty pdf") || lower.contains("empty-pdf") {
        return Some(ErrorFingerprint::EmptyPdfFile);
    }
    if lower.contains("no text files found") || lower.contains("no-text-files-found") {
        return Some(ErrorFingerprint::NoTextFilesFound);
    }
    if lower.contains("error fetching year") || lower.contains("error-fetching-year") {
        return Some(ErrorFingerprint::ErrorFetchingYear);
    }
    if lower.contains("error fetching https://") {
        let domain = extract_fetch_error_domain(lower, original).unwrap_or_else(|| "unknown-domain".to_string());
        return Some(ErrorFingerprint::FetchError { domain });
    }
    if lower.contains("ocr coordinator failed") || lower.contains("ocr-coordinator-failed") {
        return Some(ErrorFingerprint::OcrCoordinatorFailed);
    }
    if lower.contains(".pdf") && lower.contains("not found") {
        return Some(ErrorFingerprint::PdfFileNotFound);
    }
    if lower.contains("file not found") || lower.contains("file-not-found") {
        let kind = if lower.contains(".pdf") {
            FileKind::Pdf
        } else if lower.contains(".txt") {
            FileKind::Txt
        } else {
            FileKind::Other
        };
        return Some(ErrorFingerprint::FileNotFound { kind });
    }
    None
}

/// Pulls the domain out of an `"Error fetching https://{domain}/..."`
/// message, grouping by domain rather than full URL. `lower` and `original`
/// must be the same message; `lower` locates the scheme, `original`
/// preserves the domain's original case.
fn extract_fetch_error_domain(lower: &str, original: &str) -> Option<String> {
    let scheme = "https://";
    let idx = lower.find(scheme)?;
    let rest = &original[idx + scheme.len()..];
    let domain: String = rest.chars().take_while(|c| *c != '/' && !c.is_whitespace()).collect();
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_network_errors_classify_as_transient_without_fingerprint() {
        let (class, fp) = classify("connection timeout while fetching document");
        assert_eq!(class, ErrorClass::Transient);
        assert_eq!(fp, None);
    }

    #[test]
    fn corrupted_pdf_classifies_as_permanent_with_fingerprint() {
        let (class, fp) = classify("PdfReadError: failed to read pdf stream");
        assert_eq!(class, ErrorClass::Permanent);
        assert_eq!(fp, Some(ErrorFingerprint::PdfFailedToRead));
    }

    #[test]
    fn missing_storage_root_classifies_as_critical() {
        let (class, fp) = classify("storage root is missing");
        assert_eq!(class, ErrorClass::Critical);
        assert_eq!(fp, None);
    }

    #[test]
    fn fetch_error_domain_is_extracted_and_classified_critical() {
        let (class, fp) = classify("Error fetching https://example.org/agenda for meeting 2026-01-01");
        assert_eq!(class, ErrorClass::Critical);
        assert_eq!(fp, Some(ErrorFingerprint::FetchError { domain: "example.org".to_string() }));
    }

    #[test]
    fn fetch_error_with_unparseable_url_falls_back_to_unknown_domain() {
        let (class, fp) = classify("Error fetching https:// timed out");
        assert_eq!(class, ErrorClass::Critical);
        assert_eq!(fp, Some(ErrorFingerprint::FetchError { domain: "unknown-domain".to_string() }));
    }

    #[test]
    fn file_not_found_picks_up_extension_kind() {
        let (_, fp) = classify("file not found: report.txt");
        assert_eq!(fp, Some(ErrorFingerprint::FileNotFound { kind: FileKind::Txt }));
    }
}
