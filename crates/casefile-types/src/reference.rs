use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Human-facing case identifier of the form `NNN/YYYY`.
///
/// The sequence is zero-padded to at least three digits and the year is
/// always four digits. Parsing accepts any number of sequence digits and
/// normalizes, so `"7/2024"` and `"0007/2024"` both parse to `007/2024`.
///
/// Suspects reference cases by the string form of this value, so a case's
/// reference number is fixed once the case has been created.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceNumber {
    // Field order gives year-major ordering.
    year: u16,
    sequence: u32,
}

impl ReferenceNumber {
    pub const MIN_YEAR: u16 = 1000;
    pub const MAX_YEAR: u16 = 9999;

    pub fn new(sequence: u32, year: u16) -> Result<Self, TypeError> {
        let input = format!("{sequence:03}/{year}");
        if sequence == 0 {
            return Err(invalid(&input, "sequence must be positive"));
        }
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(invalid(&input, "year must have four digits"));
        }
        Ok(Self { year, sequence })
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn year(&self) -> u16 {
        self.year
    }
}

fn invalid(input: &str, reason: &str) -> TypeError {
    TypeError::InvalidReferenceNumber {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}/{}", self.sequence, self.year)
    }
}

impl fmt::Debug for ReferenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReferenceNumber({self})")
    }
}

impl FromStr for ReferenceNumber {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (seq, year) = trimmed
            .split_once('/')
            .ok_or_else(|| invalid(s, "expected NNN/YYYY"))?;

        if seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(s, "sequence must be digits"));
        }
        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(s, "year must have four digits"));
        }

        let sequence: u32 = seq
            .parse()
            .map_err(|_| invalid(s, "sequence out of range"))?;
        let year: u16 = year
            .parse()
            .map_err(|_| invalid(s, "year out of range"))?;

        Self::new(sequence, year).map_err(|e| match e {
            TypeError::InvalidReferenceNumber { reason, .. } => invalid(s, &reason),
            other => other,
        })
    }
}

impl Serialize for ReferenceNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReferenceNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pads_sequence_to_three_digits() {
        let r = ReferenceNumber::new(7, 2024).unwrap();
        assert_eq!(r.to_string(), "007/2024");
    }

    #[test]
    fn long_sequence_is_not_truncated() {
        let r = ReferenceNumber::new(1234, 2023).unwrap();
        assert_eq!(r.to_string(), "1234/2023");
    }

    #[test]
    fn zero_sequence_rejected() {
        assert!(ReferenceNumber::new(0, 2024).is_err());
    }

    #[test]
    fn short_year_rejected() {
        assert!(ReferenceNumber::new(1, 999).is_err());
        assert!("001/24".parse::<ReferenceNumber>().is_err());
    }

    #[test]
    fn parse_reports_the_failing_part() {
        let err = "001/0999".parse::<ReferenceNumber>().unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidReferenceNumber {
                input: "001/0999".into(),
                reason: "year must have four digits".into(),
            }
        );
        let err = "000/2024".parse::<ReferenceNumber>().unwrap_err();
        assert!(err.to_string().ends_with("sequence must be positive"));
    }

    #[test]
    fn parse_normalizes_padding() {
        let a: ReferenceNumber = "7/2024".parse().unwrap();
        let b: ReferenceNumber = "0007/2024".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "007/2024");
    }

    #[test]
    fn parse_trims_whitespace() {
        let r: ReferenceNumber = "  012/2021 ".parse().unwrap();
        assert_eq!(r.sequence(), 12);
        assert_eq!(r.year(), 2021);
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "/", "abc/2024", "007-2024", "007/20x4", "-7/2024", "000/2024"] {
            assert!(bad.parse::<ReferenceNumber>().is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn ordering_is_year_major() {
        let a = ReferenceNumber::new(900, 2023).unwrap();
        let b = ReferenceNumber::new(1, 2024).unwrap();
        assert!(a < b);
    }

    #[test]
    fn serde_uses_string_form() {
        let r = ReferenceNumber::new(42, 2022).unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"042/2022\"");
        let back: ReferenceNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    proptest! {
        #[test]
        fn display_parses_back(seq in 1u32..1_000_000, year in 1000u16..=9999) {
            let r = ReferenceNumber::new(seq, year).unwrap();
            let parsed: ReferenceNumber = r.to_string().parse().unwrap();
            prop_assert_eq!(parsed, r);
        }

        #[test]
        fn display_has_at_least_three_sequence_digits(seq in 1u32..1_000_000, year in 1000u16..=9999) {
            let s = ReferenceNumber::new(seq, year).unwrap().to_string();
            let (digits, y) = s.split_once('/').unwrap();
            prop_assert!(digits.len() >= 3);
            prop_assert_eq!(y.len(), 4);
        }
    }
}
