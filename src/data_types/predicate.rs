use serde::Serialize;

use crate::data_types::variants::{StoredVariant, SvType};

/// The single-base wildcard accepted in `alternateBases`
pub const WILDCARD_BASE: u8 = b'N';

/// How the alternate allele of a query is compared against stored variants
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum AltMatcher {
    /// Plain equality on the canonical bases
    Literal(String),
    /// Same length, with every `N` matching any single base
    Pattern(String),
}

impl AltMatcher {
    /// Picks the matcher from already-canonical bases.
    /// `N` is only a wildcard in plain base strings; symbolic and breakend alleles stay literal.
    pub fn from_bases(bases: String) -> Self {
        let plain_bases = bases.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T' | WILDCARD_BASE));
        if plain_bases && bases.as_bytes().contains(&WILDCARD_BASE) {
            AltMatcher::Pattern(bases)
        } else {
            AltMatcher::Literal(bases)
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, AltMatcher::Pattern(_))
    }

    /// Tests the stored alternate allele against this matcher
    pub fn matches(&self, alternate_bases: &str) -> bool {
        match self {
            AltMatcher::Literal(bases) => bases == alternate_bases,
            AltMatcher::Pattern(pattern) => {
                pattern.len() == alternate_bases.len() &&
                    pattern.bytes().zip(alternate_bases.bytes())
                        .all(|(p, b)| p == WILDCARD_BASE || p == b)
            }
        }
    }
}

/// Position constraints of a structural predicate.
/// All bounds are inclusive and independent of each other.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum PositionBounds {
    /// An exact start, and optionally an exact end
    Exact { start: u64, end: Option<u64> },
    /// Any subset of the four fuzzy bounds; at least one is set
    Range {
        start_min: Option<u64>,
        start_max: Option<u64>,
        end_min: Option<u64>,
        end_max: Option<u64>,
    },
}

impl PositionBounds {
    /// Tests a stored `[start, end)` against these bounds.
    /// An end constraint never matches a variant that has no end.
    pub fn matches(&self, start: u64, end: Option<u64>) -> bool {
        match self {
            PositionBounds::Exact { start: s, end: e } => {
                *s == start && match e {
                    Some(e) => end == Some(*e),
                    None => true
                }
            },
            PositionBounds::Range { start_min, start_max, end_min, end_max } => {
                let start_ok = start_min.map_or(true, |m| start >= m) &&
                    start_max.map_or(true, |m| start <= m);
                let end_ok = match (end_min, end_max) {
                    (None, None) => true,
                    _ => match end {
                        Some(end) => end_min.map_or(true, |m| end >= m) &&
                            end_max.map_or(true, |m| end <= m),
                        None => false
                    }
                };
                start_ok && end_ok
            }
        }
    }

    /// True when the bounds cannot be satisfied by any variant, e.g. `startMin > startMax`
    pub fn is_empty_range(&self) -> bool {
        match self {
            PositionBounds::Exact { start, end } => end.is_some_and(|e| e < *start),
            PositionBounds::Range { start_min, start_max, end_min, end_max } => {
                matches!((start_min, start_max), (Some(lo), Some(hi)) if lo > hi) ||
                    matches!((end_min, end_max), (Some(lo), Some(hi)) if lo > hi)
            }
        }
    }
}

/// The canonical, validated form of an allele query
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum MatchPredicate {
    /// Direct lookup by content address
    ExactId { id: String },
    /// Field-by-field comparison
    Structural {
        assembly_id: String,
        reference_name: String,
        reference_bases: String,
        alternate: Option<AltMatcher>,
        variant_type: Option<SvType>,
        mate_name: Option<String>,
        position: PositionBounds,
    },
}

impl MatchPredicate {
    /// Evaluates this predicate against a stored variant.
    /// Stores that can do better (e.g. an id index) are free to short-circuit `ExactId`.
    pub fn matches(&self, variant: &StoredVariant) -> bool {
        match self {
            MatchPredicate::ExactId { id } => variant.id() == id,
            MatchPredicate::Structural {
                assembly_id, reference_name, reference_bases,
                alternate, variant_type, mate_name, position
            } => {
                variant.assembly_id() == assembly_id &&
                    variant.reference_name() == reference_name &&
                    variant.reference_bases() == reference_bases &&
                    alternate.as_ref().map_or(true, |alt| alt.matches(variant.alternate_bases())) &&
                    variant_type.map_or(true, |vt| variant.variant_type() == Some(vt)) &&
                    mate_name.as_deref().map_or(true, |m| variant.mate_name() == Some(m)) &&
                    position.matches(variant.start(), variant.end())
            }
        }
    }

    /// The id when this is an exact-identity lookup
    pub fn exact_id(&self) -> Option<&str> {
        match self {
            MatchPredicate::ExactId { id } => Some(id),
            MatchPredicate::Structural { .. } => None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::variants::RawVariantRecord;
    use std::collections::BTreeMap;

    fn stored(alt: &str, start: u64, end: Option<u64>, variant_type: Option<SvType>) -> StoredVariant {
        let record = RawVariantRecord {
            chromosome: "1".to_string(),
            start,
            end,
            reference_bases: "AA".to_string(),
            alternate_bases: alt.to_string(),
            variant_type,
            mate_name: None,
            genotype_calls: BTreeMap::new(),
        };
        let calls = [("s1".to_string(), 1)].into_iter().collect();
        StoredVariant::from_record(&record, "GRCh37", "ds1", calls).unwrap()
    }

    fn structural(alternate: Option<AltMatcher>, variant_type: Option<SvType>, position: PositionBounds) -> MatchPredicate {
        MatchPredicate::Structural {
            assembly_id: "GRCh37".to_string(),
            reference_name: "1".to_string(),
            reference_bases: "AA".to_string(),
            alternate,
            variant_type,
            mate_name: None,
            position
        }
    }

    #[test]
    fn test_wildcard() {
        let matcher = AltMatcher::from_bases("NT".to_string());
        assert!(matcher.is_pattern());
        assert!(matcher.matches("AT"));
        assert!(matcher.matches("GT"));
        assert!(!matcher.matches("CC"));
        assert!(!matcher.matches("AAT"));
        assert!(!matcher.matches("T"));

        let literal = AltMatcher::from_bases("AT".to_string());
        assert!(!literal.is_pattern());
        assert!(literal.matches("AT"));
        assert!(!literal.matches("GT"));

        let breakend = AltMatcher::from_bases("N]CHR3:1000]".to_string());
        assert!(!breakend.is_pattern());
        assert!(!breakend.matches("A]CHR3:1000]"));
        assert!(!AltMatcher::from_bases("<INS>".to_string()).is_pattern());
    }

    #[test]
    fn test_exact_position() {
        let exact = PositionBounds::Exact { start: 100, end: None };
        assert!(exact.matches(100, Some(102)));
        assert!(exact.matches(100, None));
        assert!(!exact.matches(101, Some(102)));

        let exact_end = PositionBounds::Exact { start: 100, end: Some(102) };
        assert!(exact_end.matches(100, Some(102)));
        assert!(!exact_end.matches(100, Some(103)));
        assert!(!exact_end.matches(100, None));
    }

    #[test]
    fn test_range_position() {
        let range = PositionBounds::Range { start_min: Some(90), start_max: Some(110), end_min: None, end_max: None };
        assert!(range.matches(90, None));
        assert!(range.matches(110, Some(500)));
        assert!(!range.matches(111, None));

        let end_only = PositionBounds::Range { start_min: None, start_max: None, end_min: Some(200), end_max: None };
        assert!(end_only.matches(0, Some(200)));
        assert!(!end_only.matches(0, Some(199)));
        assert!(!end_only.matches(0, None));
    }

    #[test]
    fn test_out_of_order_range_is_empty() {
        let range = PositionBounds::Range { start_min: Some(200), start_max: Some(100), end_min: None, end_max: None };
        assert!(range.is_empty_range());
        for start in [50, 100, 150, 200, 250] {
            assert!(!range.matches(start, None));
        }
        let ok = PositionBounds::Range { start_min: Some(100), start_max: Some(100), end_min: None, end_max: None };
        assert!(!ok.is_empty_range());
    }

    #[test]
    fn test_structural_matches() {
        let v = stored("AT", 100, Some(102), None);
        let exact = PositionBounds::Exact { start: 100, end: None };
        assert!(structural(Some(AltMatcher::from_bases("AT".to_string())), None, exact.clone()).matches(&v));
        assert!(structural(Some(AltMatcher::from_bases("NT".to_string())), None, exact.clone()).matches(&v));
        assert!(!structural(Some(AltMatcher::from_bases("CC".to_string())), None, exact.clone()).matches(&v));
        // SNV/indel carries no type, so a typed query never matches it
        assert!(!structural(None, Some(SvType::Deletion), exact).matches(&v));
    }

    #[test]
    fn test_alt_and_type_combine() {
        let v = stored("<DEL>", 100, Some(500), Some(SvType::Deletion));
        let range = PositionBounds::Range { start_min: Some(50), start_max: Some(150), end_min: None, end_max: None };
        assert!(structural(None, Some(SvType::Deletion), range.clone()).matches(&v));
        assert!(structural(Some(AltMatcher::from_bases("<DEL>".to_string())), Some(SvType::Deletion), range.clone()).matches(&v));
        assert!(!structural(Some(AltMatcher::from_bases("<DUP>".to_string())), Some(SvType::Deletion), range.clone()).matches(&v));
        assert!(!structural(None, Some(SvType::Duplication), range).matches(&v));
    }

    #[test]
    fn test_exact_id() {
        let v = stored("AT", 100, Some(102), None);
        let pred = MatchPredicate::ExactId { id: v.id().to_string() };
        assert_eq!(pred.exact_id(), Some(v.id()));
        assert!(pred.matches(&v));
        assert!(!MatchPredicate::ExactId { id: "nope".to_string() }.matches(&v));
    }
}
