//! Redaction strategies and the service facade.
//!
//! This module provides a strategy pattern for different redaction approaches
//! and a service that runs the whole bytes-in, bytes-out pipeline.

mod rewrite;
pub mod secure;
pub mod strategy;

pub use secure::SecureRedactionStrategy;
pub use strategy::{
    ManualTarget, RedactionEntry, RedactionRequest, RedactionResult, RedactionStrategy, SkippedEntry,
};

use crate::domain::Tier;
use crate::error::{RedactorError, RedactorResult};
use crate::pdf::Document;
use crate::scan::{ScanReport, Scanner};
use std::fs;
use std::path::Path;

/// Redaction service coordinating scanning and strategy execution.
pub struct RedactionService {
    strategy: Box<dyn RedactionStrategy>,
}

impl RedactionService {
    /// Creates a new redaction service with the specified strategy.
    pub fn new(strategy: Box<dyn RedactionStrategy>) -> Self {
        Self { strategy }
    }

    /// Creates a service with secure (physical removal) redaction.
    pub fn with_secure_strategy() -> Self {
        Self::new(Box::new(SecureRedactionStrategy::default()))
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Parses `bytes` and scans them with every category of `tier`.
    ///
    /// # Errors
    /// `MalformedDocument` when the input is not a PDF.
    pub fn scan(&self, bytes: &[u8], tier: Tier) -> RedactorResult<ScanReport> {
        let document = Document::from_bytes(bytes)?;
        Ok(Scanner::for_tier(tier).scan(&document))
    }

    /// Applies a request to raw document bytes.
    ///
    /// An empty request returns the input bytes unchanged.
    pub fn redact(&self, bytes: &[u8], request: &RedactionRequest) -> RedactorResult<RedactionResult> {
        let document = Document::from_bytes(bytes)?;
        self.strategy.redact(document, request)
    }

    /// Reads `input`, applies `request` and writes the sanitized copy to
    /// `output`.
    pub fn redact_file(
        &self,
        input: &Path,
        output: &Path,
        request: &RedactionRequest,
    ) -> RedactorResult<RedactionResult> {
        let document = Document::open(input)?;
        let result = self.strategy.redact(document, request)?;
        fs::write(output, &result.output).map_err(|source| RedactorError::Io {
            path: output.to_path_buf(),
            source,
        })?;
        Ok(result)
    }
}

impl Default for RedactionService {
    fn default() -> Self {
        Self::with_secure_strategy()
    }
}
