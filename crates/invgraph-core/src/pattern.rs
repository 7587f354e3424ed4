//! # Name Patterns
//!
//! Name generators for bulk creation. A pattern is literal text with at
//! most one bracketed generator:
//!
//! | Generator                | Names for `(1,2)`                  |
//! |--------------------------|------------------------------------|
//! | `[sequence(a,b)]`        | `1`, `2`                           |
//! | `[mirror(a,b)]`          | `1-front`, `1-back`, `2-front`, `2-back` |
//! | `[multiple-mirror(a,b)]` | `front`, `back-1`, `back-2`        |
//!
//! Bounds are integers or single letters. The text around the generator
//! is kept as prefix and suffix of every name.

use crate::messages;
use crate::primitives::MAX_BULK_ELEMENTS;
use crate::types::{ErrorMessage, InventoryError};

/// How generated siblings are wired with special relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorWiring {
    None,
    /// `front` and `back` of each index mirror each other.
    Pairwise,
    /// The first name mirrors every other one.
    AllToFirst,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    names: Vec<String>,
    wiring: MirrorWiring,
}

impl NamePattern {
    pub fn parse(pattern: &str) -> Result<Self, InventoryError> {
        let invalid = || {
            InventoryError::InvalidArgument(ErrorMessage::new(messages::PATTERN_INVALID).arg(pattern))
        };
        let Some(open) = pattern.find('[') else {
            if pattern.contains(']') {
                return Err(invalid());
            }
            return Ok(Self {
                names: vec![pattern.to_string()],
                wiring: MirrorWiring::None,
            });
        };
        let close = pattern[open..].find(']').map(|i| open + i).ok_or_else(invalid)?;
        let prefix = &pattern[..open];
        let suffix = &pattern[close + 1..];
        if suffix.contains('[') || suffix.contains(']') {
            return Err(invalid());
        }

        let generator = &pattern[open + 1..close];
        let (kind, args) = generator.split_once('(').ok_or_else(invalid)?;
        let args = args.strip_suffix(')').ok_or_else(invalid)?;
        let (from, to) = args.split_once(',').ok_or_else(invalid)?;
        let indices = range(from.trim(), to.trim()).ok_or_else(invalid)?;

        let (names, wiring) = match kind.trim() {
            "sequence" => (
                indices
                    .iter()
                    .map(|i| format!("{}{}{}", prefix, i, suffix))
                    .collect(),
                MirrorWiring::None,
            ),
            "mirror" => (
                indices
                    .iter()
                    .flat_map(|i| {
                        [
                            format!("{}{}-front{}", prefix, i, suffix),
                            format!("{}{}-back{}", prefix, i, suffix),
                        ]
                    })
                    .collect(),
                MirrorWiring::Pairwise,
            ),
            "multiple-mirror" => {
                let mut names = vec![format!("{}front{}", prefix, suffix)];
                names.extend(indices.iter().map(|i| format!("{}back-{}{}", prefix, i, suffix)));
                (names, MirrorWiring::AllToFirst)
            }
            _ => return Err(invalid()),
        };
        Ok(Self { names, wiring })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn wiring(&self) -> MirrorWiring {
        self.wiring
    }

    /// The first `count` names. Fails if the pattern yields fewer.
    pub fn take(&self, count: usize) -> Result<&[String], InventoryError> {
        self.names.get(..count).ok_or_else(|| {
            InventoryError::InvalidArgument(
                ErrorMessage::new(messages::PATTERN_TOO_SHORT)
                    .arg(self.names.len())
                    .arg(count),
            )
        })
    }

    /// Index pairs to mirror among the first `count` generated siblings.
    pub fn mirror_pairs(&self, count: usize) -> Vec<(usize, usize)> {
        let count = count.min(self.names.len());
        match self.wiring {
            MirrorWiring::None => Vec::new(),
            MirrorWiring::Pairwise => (0..count / 2).map(|i| (2 * i, 2 * i + 1)).collect(),
            MirrorWiring::AllToFirst => (1..count).map(|i| (0, i)).collect(),
        }
    }
}

/// Rendered indices of an inclusive range of integers or letters.
fn range(from: &str, to: &str) -> Option<Vec<String>> {
    if let (Ok(a), Ok(b)) = (from.parse::<i64>(), to.parse::<i64>()) {
        let len = b.checked_sub(a)?.checked_add(1)?;
        if len <= 0 || len > MAX_BULK_ELEMENTS as i64 {
            return None;
        }
        return Some((a..=b).map(|i| i.to_string()).collect());
    }
    let mut a = from.chars();
    let mut b = to.chars();
    match (a.next(), a.next(), b.next(), b.next()) {
        (Some(a), None, Some(b), None) if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() && a <= b => {
            Some((a..=b).map(String::from).collect())
        }
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_yields_itself() {
        let p = NamePattern::parse("slot").expect("parse");
        assert_eq!(p.names(), ["slot"]);
        assert_eq!(p.wiring(), MirrorWiring::None);
    }

    #[test]
    fn numeric_sequence_keeps_prefix_and_suffix() {
        let p = NamePattern::parse("port-[sequence(1,3)]/a").expect("parse");
        assert_eq!(p.names(), ["port-1/a", "port-2/a", "port-3/a"]);
    }

    #[test]
    fn letter_sequence() {
        let p = NamePattern::parse("[sequence(a,c)]").expect("parse");
        assert_eq!(p.names(), ["a", "b", "c"]);
    }

    #[test]
    fn mirror_generates_pairs() {
        let p = NamePattern::parse("[mirror(1,2)]").expect("parse");
        assert_eq!(p.names(), ["1-front", "1-back", "2-front", "2-back"]);
        assert_eq!(p.mirror_pairs(4), vec![(0, 1), (2, 3)]);
        assert_eq!(p.mirror_pairs(3), vec![(0, 1)]);
    }

    #[test]
    fn multiple_mirror_wires_first_to_all() {
        let p = NamePattern::parse("[multiple-mirror(1,3)]").expect("parse");
        assert_eq!(p.names(), ["front", "back-1", "back-2", "back-3"]);
        assert_eq!(p.mirror_pairs(4), vec![(0, 1), (0, 2), (0, 3)]);
    }

    #[test]
    fn malformed_patterns_rejected() {
        for bad in [
            "[sequence(3,1)]",
            "[sequence(1,a)]",
            "[unknown(1,2)]",
            "[sequence(1,2)",
            "a]b",
            "[sequence(1,2)][sequence(1,2)]",
            "[sequence(aa,bb)]",
        ] {
            let err = NamePattern::parse(bad).expect_err(bad);
            assert_eq!(err.key(), Some(messages::PATTERN_INVALID), "{}", bad);
        }
    }

    #[test]
    fn take_more_than_available_fails() {
        let p = NamePattern::parse("[sequence(1,2)]").expect("parse");
        assert_eq!(p.take(1).expect("take"), ["1"]);
        let err = p.take(3).expect_err("too short");
        assert_eq!(err.key(), Some(messages::PATTERN_TOO_SHORT));
    }
}
