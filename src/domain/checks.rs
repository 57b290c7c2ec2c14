//! Validators that refine raw pattern matches.

use chrono::{Datelike, NaiveDate, Utc};

/// Payment card networks recognised by prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardIssuer {
    Visa,
    Mastercard,
    Amex,
    Discover,
    DinersClub,
    Jcb,
    UnionPay,
}

impl CardIssuer {
    fn accepts_length(self, len: usize) -> bool {
        match self {
            Self::Visa => matches!(len, 13 | 16 | 19),
            Self::Mastercard => len == 16,
            Self::Amex => len == 15,
            Self::Discover | Self::Jcb | Self::UnionPay => (16..=19).contains(&len),
            Self::DinersClub => (14..=19).contains(&len),
        }
    }
}

fn prefix(digits: &str, len: usize) -> u32 {
    digits.get(..len).and_then(|p| p.parse().ok()).unwrap_or(0)
}

/// Identifies the issuer of a digit-only card number by its prefix.
pub fn card_issuer(digits: &str) -> Option<CardIssuer> {
    let p1 = prefix(digits, 1);
    let p2 = prefix(digits, 2);
    let p3 = prefix(digits, 3);
    let p4 = prefix(digits, 4);
    let p6 = prefix(digits, 6);

    let issuer = if p1 == 4 {
        CardIssuer::Visa
    } else if (51..=55).contains(&p2) || (2221..=2720).contains(&p4) {
        CardIssuer::Mastercard
    } else if p2 == 34 || p2 == 37 {
        CardIssuer::Amex
    } else if p4 == 6011 || p2 == 65 || (644..=649).contains(&p3) || (622126..=622925).contains(&p6) {
        CardIssuer::Discover
    } else if p2 == 62 {
        CardIssuer::UnionPay
    } else if (300..=305).contains(&p3) || p2 == 36 || p2 == 38 || p2 == 39 {
        CardIssuer::DinersClub
    } else if (3528..=3589).contains(&p4) {
        CardIssuer::Jcb
    } else {
        return None;
    };
    Some(issuer)
}

/// Luhn (mod 10) checksum over a digit-only string.
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Accepts a 13-19 digit card number with a known issuer prefix and a valid
/// Luhn checksum. Spaces and hyphens are ignored.
pub fn payment_card_valid(candidate: &str) -> bool {
    let digits: String = candidate.chars().filter(char::is_ascii_digit).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    card_issuer(&digits).is_some_and(|issuer| issuer.accepts_length(digits.len())) && luhn_valid(&digits)
}

/// Rejects SSNs with an all-zero area, group or serial.
pub fn ssn_groups_valid(candidate: &str) -> bool {
    let digits: String = candidate.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 9 {
        return false;
    }
    let (area, rest) = digits.split_at(3);
    let (group, serial) = rest.split_at(2);
    area != "000" && group != "00" && serial != "0000"
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn month_from_word(text: &str) -> Option<u32> {
    let lower = text.to_ascii_lowercase();
    lower
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| word.len() >= 3)
        .find_map(|word| MONTHS.iter().position(|m| word.starts_with(m)))
        .map(|index| index as u32 + 1)
}

/// True when the year, month and day form a calendar date that could be a
/// birth date. Four-digit years must fall in 1900..=current year; two-digit
/// years are mapped onto the last century.
fn plausible(year: &str, month: u32, day: u32, current_year: i32) -> bool {
    let Ok(value) = year.parse::<i32>() else {
        return false;
    };
    let year = match year.len() {
        2 if value <= current_year % 100 => 2000 + value,
        2 => 1900 + value,
        4 if (1900..=current_year).contains(&value) => value,
        _ => return false,
    };
    NaiveDate::from_ymd_opt(year, month, day).is_some()
}

/// Validates a date-like token as a plausible birth date.
///
/// Numeric forms are tried month-first, then day-first; a four-digit first
/// group is read as ISO year-month-day.
pub fn birth_date_valid(candidate: &str) -> bool {
    birth_date_valid_in(candidate, Utc::now().year())
}

pub(crate) fn birth_date_valid_in(candidate: &str, current_year: i32) -> bool {
    let numbers: Vec<&str> = candidate
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .collect();
    let num = |s: &str| s.parse::<u32>().unwrap_or(0);

    if let Some(month) = month_from_word(candidate) {
        return match numbers[..] {
            [day, year] => plausible(year, month, num(day), current_year),
            _ => false,
        };
    }

    match numbers[..] {
        [year, month, day] if year.len() == 4 => plausible(year, num(month), num(day), current_year),
        [a, b, year] => {
            plausible(year, num(a), num(b), current_year) || plausible(year, num(b), num(a), current_year)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luhn() {
        assert!(luhn_valid("4111111111111111"));
        assert!(!luhn_valid("4111111111111112"));
        assert!(luhn_valid("79927398713"));
        assert!(!luhn_valid(""));
    }

    #[test]
    fn test_card_issuers() {
        assert_eq!(card_issuer("4111111111111111"), Some(CardIssuer::Visa));
        assert_eq!(card_issuer("5500000000000004"), Some(CardIssuer::Mastercard));
        assert_eq!(card_issuer("2223000048400011"), Some(CardIssuer::Mastercard));
        assert_eq!(card_issuer("378282246310005"), Some(CardIssuer::Amex));
        assert_eq!(card_issuer("6011111111111117"), Some(CardIssuer::Discover));
        assert_eq!(card_issuer("3530111333300000"), Some(CardIssuer::Jcb));
        assert_eq!(card_issuer("1234567890123"), None);
    }

    #[test]
    fn test_payment_card_valid() {
        assert!(payment_card_valid("4111 1111 1111 1111"));
        assert!(payment_card_valid("3782-822463-10005"));
        assert!(!payment_card_valid("4111111111111112"));
        // Luhn-valid but unknown prefix
        assert!(!payment_card_valid("0000000000000000"));
    }

    #[test]
    fn test_ssn_groups() {
        assert!(ssn_groups_valid("123-45-6789"));
        assert!(!ssn_groups_valid("000-45-6789"));
        assert!(!ssn_groups_valid("123 00 6789"));
        assert!(!ssn_groups_valid("123450000"));
    }

    #[test]
    fn test_birth_dates() {
        assert!(birth_date_valid_in("04/15/1985", 2024));
        assert!(birth_date_valid_in("15/04/1985", 2024));
        assert!(birth_date_valid_in("1985-04-15", 2024));
        assert!(birth_date_valid_in("April 15, 1985", 2024));
        assert!(birth_date_valid_in("15 Apr 1985", 2024));
        assert!(birth_date_valid_in("04/15/85", 2024));
        assert!(!birth_date_valid_in("02/30/1985", 2024));
        assert!(!birth_date_valid_in("04/15/1850", 2024));
        assert!(!birth_date_valid_in("04/15/2031", 2024));
        assert!(!birth_date_valid_in("13/13/1985", 2024));
    }
}
