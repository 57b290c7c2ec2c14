//! Composable matching rules: pattern, optional label context, optional check.

use super::checks;
use super::PatternMatcher;
use regex::Regex;
use std::ops::Range;

/// Requires a label to appear shortly before a match.
#[derive(Debug, Clone)]
pub struct ContextRequirement {
    label: Regex,
    window: usize,
}

impl ContextRequirement {
    /// `window` is measured in bytes before the start of the match.
    pub fn new(label: Regex, window: usize) -> Self {
        Self { label, window }
    }

    pub fn is_satisfied(&self, text: &str, match_start: usize) -> bool {
        let mut lo = match_start.saturating_sub(self.window);
        while !text.is_char_boundary(lo) {
            lo -= 1;
        }
        self.label.is_match(&text[lo..match_start])
    }
}

/// Validator applied to a candidate after its pattern and context matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// No all-zero SSN group
    SsnGroups,
    /// Known issuer prefix and Luhn checksum
    PaymentCard,
    /// Calendar-valid date in a plausible year range
    BirthDate,
    /// At least one ASCII digit
    HasDigit,
}

impl Check {
    pub fn accepts(&self, candidate: &str) -> bool {
        match self {
            Self::SsnGroups => checks::ssn_groups_valid(candidate),
            Self::PaymentCard => checks::payment_card_valid(candidate),
            Self::BirthDate => checks::birth_date_valid(candidate),
            Self::HasDigit => candidate.chars().any(|c| c.is_ascii_digit()),
        }
    }
}

/// Spans accepted by a rule, plus how many candidates its check rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    pub accepted: Vec<Range<usize>>,
    pub rejected: usize,
}

/// Digit groups of a candidate: maximal runs between spaces and hyphens.
fn groups(candidate: &str) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = None;
    for (i, c) in candidate.char_indices() {
        match (c == ' ' || c == '-', start) {
            (true, Some(s)) => {
                groups.push(s..i);
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        groups.push(s..candidate.len());
    }
    groups
}

/// The longest run of whole groups, shorter than the candidate, that passes
/// `check`. Among runs of equal length the earliest wins.
fn narrowed(candidate: &str, check: Check) -> Option<Range<usize>> {
    let groups = groups(candidate);
    for len in (1..groups.len()).rev() {
        for window in groups.windows(len) {
            let range = window[0].start..window[len - 1].end;
            if check.accepts(&candidate[range.clone()]) {
                return Some(range);
            }
        }
    }
    None
}

/// One way of recognising a category.
///
/// When the pattern has a capture group named `value`, only that group is
/// reported; the rest of the match acts as anchoring context.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    context: Option<ContextRequirement>,
    check: Option<Check>,
    narrow_groups: bool,
}

impl Rule {
    pub fn new(pattern: Regex) -> Self {
        Self {
            pattern,
            context: None,
            check: None,
            narrow_groups: false,
        }
    }

    pub fn with_context(mut self, label: Regex, window: usize) -> Self {
        self.context = Some(ContextRequirement::new(label, window));
        self
    }

    pub fn with_check(mut self, check: Check) -> Self {
        self.check = Some(check);
        self
    }

    /// When the check rejects a candidate made of separated digit groups,
    /// retry shorter runs of those groups before counting a rejection. A
    /// greedy pattern can swallow an expiry date or a reference number that
    /// follows the real value.
    pub fn with_group_narrowing(mut self) -> Self {
        self.narrow_groups = true;
        self
    }

    pub fn evaluate(&self, text: &str) -> RuleOutcome {
        let value_group = self
            .pattern
            .capture_names()
            .position(|name| name == Some("value"));
        let mut outcome = RuleOutcome::default();

        for caps in self.pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let span = value_group.and_then(|i| caps.get(i)).unwrap_or(whole);
            if span.as_str().is_empty() {
                continue;
            }
            if let Some(context) = &self.context {
                if !context.is_satisfied(text, whole.start()) {
                    continue;
                }
            }
            if let Some(check) = self.check {
                if !check.accepts(span.as_str()) {
                    let inner = if self.narrow_groups {
                        narrowed(span.as_str(), check)
                    } else {
                        None
                    };
                    match inner {
                        Some(inner) => outcome
                            .accepted
                            .push(span.start() + inner.start..span.start() + inner.end),
                        None => outcome.rejected += 1,
                    }
                    continue;
                }
            }
            outcome.accepted.push(span.range());
        }
        outcome
    }
}

impl PatternMatcher for Rule {
    fn find_spans(&self, text: &str) -> Vec<Range<usize>> {
        self.evaluate(text).accepted
    }
}
