//! Common test utilities and helpers.
//!
//! This module provides shared functionality for all tests, including:
//! - Fixture builders with exact text placement
//! - Redaction assertions backed by two independent extractors
//! - PDF inspection helpers

pub mod assertions;
pub mod fixtures;
pub mod pdf_helpers;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use pdf_helpers::*;
