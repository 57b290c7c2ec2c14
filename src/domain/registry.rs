//! The fixed catalog of PII categories.
//!
//! Patterns are compiled once on first use. A pattern that fails to compile
//! is a programming error and aborts at startup.

use super::rule::{Check, Rule};
use super::{PatternMatcher, PiiKind, Tier};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// Street suffixes accepted after a street name, in title case.
const STREET_SUFFIXES: &[&str] = &[
    "Street", "St", "Avenue", "Ave", "Road", "Rd", "Boulevard", "Blvd", "Drive", "Dr", "Lane",
    "Ln", "Court", "Ct", "Way", "Place", "Pl", "Terrace", "Ter", "Circle", "Cir", "Parkway",
    "Pkwy", "Highway", "Hwy", "Square", "Sq", "Trail", "Trl",
];

/// A static PII category definition.
#[derive(Debug)]
pub struct PiiCategory {
    kind: PiiKind,
    display_label: &'static str,
    tier: Tier,
    rules: Vec<Rule>,
}

impl PiiCategory {
    pub fn kind(&self) -> PiiKind {
        self.kind
    }

    /// String identifier such as `SSN_FULL`.
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn display_label(&self) -> &'static str {
        self.display_label
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Accepted spans in text order, plus the number of candidates a
    /// validator rejected. Identical spans produced by different rules of
    /// this category are reported once.
    pub fn find_with_rejections(&self, text: &str) -> (Vec<Range<usize>>, usize) {
        let mut spans = Vec::new();
        let mut rejected = 0;
        for rule in &self.rules {
            let outcome = rule.evaluate(text);
            spans.extend(outcome.accepted);
            rejected += outcome.rejected;
        }
        spans.sort_by_key(|span| (span.start, span.end));
        spans.dedup();
        (spans, rejected)
    }

    pub fn find_in(&self, text: &str) -> Vec<Range<usize>> {
        self.find_with_rejections(text).0
    }
}

impl PatternMatcher for PiiCategory {
    fn find_spans(&self, text: &str) -> Vec<Range<usize>> {
        self.find_in(text)
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Valid registry pattern")
}

fn street_address_pattern() -> String {
    let suffixes = STREET_SUFFIXES
        .iter()
        .flat_map(|s| [s.to_string(), s.to_uppercase()])
        .collect::<Vec<_>>()
        .join("|");
    format!(
        r"\b\d{{1,6}}[ \t]+(?:(?:[A-Z][A-Za-z'-]*|\d+(?:st|nd|rd|th|ST|ND|RD|TH))[ \t]+){{1,4}}(?:{})\b\.?",
        suffixes
    )
}

fn build_registry() -> Vec<PiiCategory> {
    let label = |pattern: &str| re(pattern);

    vec![
        PiiCategory {
            kind: PiiKind::SsnFull,
            display_label: "SSN (Full)",
            tier: Tier::Free,
            rules: vec![Rule::new(re(r"\b\d{3}[- ]?\d{2}[- ]?\d{4}\b")).with_check(Check::SsnGroups)],
        },
        PiiCategory {
            kind: PiiKind::SsnPartial,
            display_label: "SSN (Partial)",
            tier: Tier::Free,
            rules: vec![
                Rule::new(re(
                    r"(?i)(?:[X*]{3}[- ]?[X*]{2}[- ]?\d{4}\b|\b\d{3}[- ]?[X*]{2}[- ]?[X*]{4})",
                )),
                Rule::new(re(
                    r"(?i)\b(?:SSN|SS#|social\s+security(?:\s+(?:number|no\.?))?)\s*(?:\(?last\s*(?:4|four)\)?|ending\s+in)?\s*[:#]?\s*(?P<value>\d{4})\b",
                )),
                Rule::new(re(
                    r"(?i)\blast\s*(?:4|four)(?:\s+digits)?(?:\s+of\s+(?:your\s+)?(?:SSN|social\s+security(?:\s+number)?))?\s*[:#]?\s*(?P<value>\d{4})\b",
                )),
            ],
        },
        PiiCategory {
            kind: PiiKind::DateOfBirth,
            display_label: "Date of Birth",
            tier: Tier::Free,
            rules: vec![
                Rule::new(re(r"\b\d{1,2}[/.-]\d{1,2}[/.-]\d{4}\b")).with_check(Check::BirthDate),
                // two-digit years only next to a birth label
                Rule::new(re(
                    r"(?i)\b(?:DOB|D\.O\.B\.?|date\s+of\s+birth|birth\s*date|born(?:\s+on)?)\s*[:#-]?\s*(?P<value>\d{1,2}[/.-]\d{1,2}[/.-]\d{2})\b",
                ))
                .with_check(Check::BirthDate),
                Rule::new(re(r"\b\d{4}-\d{1,2}-\d{1,2}\b")).with_check(Check::BirthDate),
                Rule::new(re(
                    r"(?i)\b(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b",
                ))
                .with_check(Check::BirthDate),
                Rule::new(re(
                    r"(?i)\b\d{1,2}\s+(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\.?,?\s+\d{4}\b",
                ))
                .with_check(Check::BirthDate),
            ],
        },
        PiiCategory {
            kind: PiiKind::PhoneNumber,
            display_label: "Phone Number",
            tier: Tier::Free,
            rules: vec![
                Rule::new(re(
                    r"(?:\+1[-.\s]?|\b1[-.\s])?(?:\(\d{3}\)\s?|\b\d{3}(?:[-.]\s?|\s)?)\d{3}(?:[-.]\s?|\s)?\d{4}\b",
                )),
                Rule::new(re(r"\b1\d{10}\b")),
            ],
        },
        PiiCategory {
            kind: PiiKind::EmailAddress,
            display_label: "Email",
            tier: Tier::Free,
            rules: vec![Rule::new(re(
                r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}\b",
            ))],
        },
        PiiCategory {
            kind: PiiKind::DriversLicense,
            display_label: "Driver's License",
            tier: Tier::Free,
            rules: vec![
                Rule::new(re(
                    r"\b(?:[A-Z]\d{7}|[A-Z]\d{11,14}|[A-Z]\d{3}-\d{3}-\d{2}-\d{3}-\d|[A-Z]\d{3}-\d{4}-\d{4}|WDL[A-Z0-9]{9})\b",
                )),
                Rule::new(re(r"\b[A-Z0-9][A-Z0-9-]{4,18}[A-Z0-9]\b"))
                    .with_context(
                        label(
                            r"(?i)(?:\bDL\b|\bD\.L\.|\bdriver'?s?\s+lic(?:ense|\.)?|\blicen[cs]e\s*(?:no\.?|number|#))",
                        ),
                        32,
                    )
                    .with_check(Check::HasDigit),
            ],
        },
        PiiCategory {
            kind: PiiKind::AccountNumber,
            display_label: "Account Number",
            tier: Tier::Free,
            rules: vec![Rule::new(re(r"\b\d{8,}\b")).with_context(label(r"(?i)\b(?:account|acct)\b"), 40)],
        },
        PiiCategory {
            kind: PiiKind::StreetAddress,
            display_label: "Street Address",
            tier: Tier::Premium,
            rules: vec![Rule::new(re(&street_address_pattern()))],
        },
        PiiCategory {
            kind: PiiKind::ZipCode,
            display_label: "Zip Code",
            tier: Tier::Premium,
            rules: vec![Rule::new(re(r"\b\d{5}(?:-\d{4})?\b"))],
        },
        PiiCategory {
            kind: PiiKind::CreditCard,
            display_label: "Credit Card",
            tier: Tier::Premium,
            rules: vec![Rule::new(re(r"\b(?:\d[ -]?){12,18}\d\b"))
                .with_check(Check::PaymentCard)
                .with_group_narrowing()],
        },
    ]
}

static REGISTRY: Lazy<Vec<PiiCategory>> = Lazy::new(build_registry);

/// Every category, in registry order.
pub fn all_categories() -> &'static [PiiCategory] {
    &REGISTRY
}

/// Categories available at `tier`, in registry order. Premium includes all
/// free categories.
pub fn list_categories(tier: Tier) -> Vec<&'static PiiCategory> {
    REGISTRY.iter().filter(|c| c.tier <= tier).collect()
}

/// Looks up a single category.
pub fn category(kind: PiiKind) -> &'static PiiCategory {
    &REGISTRY[kind as usize]
}
