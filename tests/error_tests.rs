//! Error handling tests.
//!
//! These tests verify error variants, conversions, and how failures surface
//! through the public API: hard failures for unusable input, collected
//! reports for page- and entry-level problems.

use pii_redactor::error::{RedactorError, RedactorResult};
use pii_redactor::{extract_text_from_pdf, Document, RedactionRequest, RedactionService, Tier};
use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};

mod common;
use common::*;

/// Tests error display formatting so user-facing messages stay actionable.
mod display {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = RedactorError::Io {
            path: PathBuf::from("/test/path.pdf"),
            source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
        };

        let display = err.to_string();
        assert!(display.contains("/test/path.pdf"));
        assert!(display.contains("IO error"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn test_malformed_document_display() {
        let err = RedactorError::MalformedDocument {
            reason: "missing %PDF- header".to_string(),
            source: None,
        };
        assert_eq!(err.to_string(), "Malformed document: missing %PDF- header");
    }

    #[test]
    fn test_page_extraction_display() {
        let err = RedactorError::PageExtraction {
            page: 4,
            reason: "content stream is missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Text extraction failed on page 4: content stream is missing"
        );
    }

    #[test]
    fn test_pattern_error_display() {
        let err = RedactorError::PatternError {
            pattern: "[invalid(".to_string(),
            reason: "unclosed bracket".to_string(),
        };

        let display = err.to_string();
        assert!(display.contains("[invalid("));
        assert!(display.contains("unclosed bracket"));
        assert!(display.contains("Pattern error"));
    }

    #[test]
    fn test_all_errors_have_nonempty_display() {
        let errors = vec![
            RedactorError::Io {
                path: PathBuf::new(),
                source: io::Error::new(io::ErrorKind::Other, ""),
            },
            RedactorError::MalformedDocument {
                reason: String::new(),
                source: None,
            },
            RedactorError::PageExtraction {
                page: 0,
                reason: String::new(),
            },
            RedactorError::OutOfRangeTarget {
                page: 0,
                reason: String::new(),
            },
            RedactorError::PdfProcessing {
                message: String::new(),
                page: None,
                source: None,
            },
            RedactorError::PatternError {
                pattern: String::new(),
                reason: String::new(),
            },
            RedactorError::InvalidInput {
                parameter: String::new(),
                reason: String::new(),
            },
        ];
        for err in errors {
            assert!(!err.to_string().is_empty(), "{:?}", err);
        }
    }
}

/// Tests source chaining and conversions.
mod chaining {
    use super::*;

    #[test]
    fn test_io_error_source_chain() {
        let err = RedactorError::Io {
            path: PathBuf::from("/test"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
        };

        let source = StdError::source(&err).expect("io error is the source");
        assert_eq!(source.to_string(), "access denied");
    }

    #[test]
    fn test_malformed_document_keeps_parser_error() {
        let err = Document::from_bytes(b"%PDF-1.5\nthis is not a pdf body".to_vec()).unwrap_err();
        assert!(matches!(err, RedactorError::MalformedDocument { .. }));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn test_from_regex_error_conversion() {
        let regex_err = regex::Regex::new("(unclosed").unwrap_err();
        let err: RedactorError = regex_err.into();
        assert!(matches!(err, RedactorError::PatternError { .. }));
    }

    #[test]
    fn test_error_converts_into_anyhow() {
        fn run() -> anyhow::Result<()> {
            Document::from_bytes(Vec::new())?;
            Ok(())
        }
        let err = run().unwrap_err();
        assert!(err.to_string().contains("Malformed document"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<RedactorError>();
    }

    #[test]
    fn test_result_alias() {
        fn parse(bytes: &[u8]) -> RedactorResult<usize> {
            Ok(Document::from_bytes(bytes)?.page_count())
        }
        assert_eq!(parse(&statement_pdf()).unwrap(), 1);
        assert!(parse(b"garbage").is_err());
    }
}

/// Tests how failures surface through the public API.
mod scenarios {
    use super::*;

    #[test]
    fn test_garbage_input_is_malformed() {
        for input in [&b""[..], b"not a pdf", b"%PDF", &[0u8; 64][..]] {
            assert!(
                matches!(
                    Document::from_bytes(input),
                    Err(RedactorError::MalformedDocument { .. })
                ),
                "{:?}",
                input
            );
        }
    }

    #[test]
    fn test_truncated_pdf_does_not_panic() {
        let bytes = statement_pdf();
        let truncated = &bytes[..bytes.len() / 3];
        if let Err(err) = Document::from_bytes(truncated) {
            assert!(matches!(err, RedactorError::MalformedDocument { .. }));
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Document::open(Path::new("/nonexistent/input.pdf")).unwrap_err();
        match err {
            RedactorError::Io { path, source } => {
                assert_eq!(path, PathBuf::from("/nonexistent/input.pdf"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_service_rejects_garbage_for_redaction() {
        let service = RedactionService::default();
        let err = service.redact(b"garbage", &RedactionRequest::new()).unwrap_err();
        assert!(matches!(err, RedactorError::MalformedDocument { .. }));
    }

    #[test]
    fn test_corrupt_page_is_partial_failure() {
        let bytes = TestPdfBuilder::new().broken_contents().build();
        let document = Document::from_bytes(bytes).unwrap();

        let err = document.page_text(0).unwrap_err();
        assert!(matches!(err, RedactorError::PageExtraction { page: 0, .. }));
        assert!(err.is_partial());

        let report = RedactionService::default()
            .scan(document.as_bytes(), Tier::Premium)
            .unwrap();
        assert_eq!(report.skipped_pages.len(), 1);
        assert_eq!(report.pages_scanned, 0);
    }

    /// One text page with no `/MediaBox` anywhere in the page tree.
    fn page_without_media_box() -> Vec<u8> {
        use lopdf::{dictionary, Object, Stream};

        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"BT /F1 12 Tf 72 700 Td (SSN 123-45-6789) Tj ET".to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_layout_failure_is_page_error_not_panic() {
        let bytes = page_without_media_box();
        let document = Document::from_bytes(bytes.clone()).unwrap();

        let err = document.page_text(0).unwrap_err();
        assert!(matches!(err, RedactorError::PageExtraction { page: 0, .. }));
        assert!(matches!(
            extract_text_from_pdf(&bytes),
            Err(RedactorError::PdfProcessing { .. })
        ));
    }

    #[test]
    fn test_tier_parse_error() {
        let err = "gold".parse::<Tier>().unwrap_err();
        assert!(matches!(err, RedactorError::InvalidInput { .. }));
        assert_eq!("Premium".parse::<Tier>().unwrap(), Tier::Premium);
    }
}
