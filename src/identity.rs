/*!
# Identity
Content addressing for variants.
Two observations are the same variant if and only if their derived ids are equal; there is no secondary matching by overlap.

The id is the MD5 hex digest over the canonical identity fields in a fixed order:
`referenceName`, `start`, `end`, `referenceBases`, `alternateBases`, `assemblyId`, joined by a tab.
When `end` is absent (imprecise SVs) it is left out of the hash input entirely, so the digest covers five fields instead of six.

## Example usage
```rust
use allele_beacon::identity::derive_id;

let a = derive_id("chr1", 100, Some(101), "a", "t", "GRCh37");
let b = derive_id("1", 100, Some(101), "A", "T", "GRCh37");
assert_eq!(a, b);
assert_ne!(a, derive_id("1", 100, Some(101), "A", "C", "GRCh37"));
```
*/
use md5::{Digest, Md5};

/// Separator between hashed fields; never valid inside a base string or a coordinate
const FIELD_SEPARATOR: &str = "\t";

/// Bases are compared case-insensitively, so everything is stored uppercase
pub fn canonical_bases(bases: &str) -> String {
    bases.trim().to_ascii_uppercase()
}

/// Strips any `chr` prefix and collapses the mitochondrial aliases onto `MT`.
/// # Examples
/// * `chr1` -> `1`
/// * `chrM` -> `MT`
/// * `x` -> `X`
pub fn canonical_chromosome(chrom: &str) -> String {
    let trimmed = chrom.trim();
    let stripped = match trimmed.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("chr") => &trimmed[3..],
        _ => trimmed
    };
    let upper = stripped.to_ascii_uppercase();
    if upper == "M" {
        "MT".to_string()
    } else {
        upper
    }
}

/// The identity fields of a variant after canonicalization.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct VariantIdentity {
    pub reference_name: String,
    pub start: u64,
    pub end: Option<u64>,
    pub reference_bases: String,
    pub alternate_bases: String,
    pub assembly_id: String,
}

impl VariantIdentity {
    /// Canonicalizes the raw fields.
    /// # Arguments
    /// * `reference_name` - chromosome, any supported alias
    /// * `start` - 0-based start
    /// * `end` - 0-based exclusive end, if known
    /// * `reference_bases` - REF allele
    /// * `alternate_bases` - ALT allele
    /// * `assembly_id` - genome build, kept verbatim apart from trimming
    pub fn new(
        reference_name: &str, start: u64, end: Option<u64>,
        reference_bases: &str, alternate_bases: &str, assembly_id: &str
    ) -> Self {
        Self {
            reference_name: canonical_chromosome(reference_name),
            start,
            end,
            reference_bases: canonical_bases(reference_bases),
            alternate_bases: canonical_bases(alternate_bases),
            assembly_id: assembly_id.trim().to_string(),
        }
    }

    /// The content address for these fields
    pub fn id(&self) -> String {
        let start = self.start.to_string();
        let end = self.end.map(|e| e.to_string());

        let mut fields: Vec<&str> = Vec::with_capacity(6);
        fields.push(&self.reference_name);
        fields.push(&start);
        if let Some(end) = end.as_deref() {
            fields.push(end);
        }
        fields.push(&self.reference_bases);
        fields.push(&self.alternate_bases);
        fields.push(&self.assembly_id);

        let mut hasher = Md5::new();
        hasher.update(fields.join(FIELD_SEPARATOR));
        format!("{:x}", hasher.finalize())
    }
}

/// Derives the variant id from raw identity fields.
/// This is a pure function; callers are expected to pass already-validated values.
pub fn derive_id(
    reference_name: &str, start: u64, end: Option<u64>,
    reference_bases: &str, alternate_bases: &str, assembly_id: &str
) -> String {
    VariantIdentity::new(reference_name, start, end, reference_bases, alternate_bases, assembly_id).id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_canonical_chromosome() {
        assert_eq!(canonical_chromosome("chr1"), "1");
        assert_eq!(canonical_chromosome("CHR22"), "22");
        assert_eq!(canonical_chromosome("x"), "X");
        assert_eq!(canonical_chromosome("chrM"), "MT");
        assert_eq!(canonical_chromosome("MT"), "MT");
        assert_eq!(canonical_chromosome(" 7 "), "7");
    }

    #[test]
    fn test_deterministic() {
        let a = derive_id("1", 100, Some(101), "A", "T", "GRCh37");
        let b = derive_id("1", 100, Some(101), "A", "T", "GRCh37");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_canonicalization_collapses() {
        let base = derive_id("1", 100, Some(101), "A", "T", "GRCh37");
        assert_eq!(base, derive_id("chr1", 100, Some(101), "a", "t", "GRCh37"));
        assert_eq!(base, derive_id("1", 100, Some(101), " A", "T ", " GRCh37"));
    }

    #[test]
    fn test_each_field_matters() {
        let ids: BTreeSet<String> = [
            derive_id("1", 100, Some(101), "A", "T", "GRCh37"),
            derive_id("2", 100, Some(101), "A", "T", "GRCh37"),
            derive_id("1", 101, Some(101), "A", "T", "GRCh37"),
            derive_id("1", 100, Some(102), "A", "T", "GRCh37"),
            derive_id("1", 100, None, "A", "T", "GRCh37"),
            derive_id("1", 100, Some(101), "C", "T", "GRCh37"),
            derive_id("1", 100, Some(101), "A", "G", "GRCh37"),
            derive_id("1", 100, Some(101), "A", "T", "GRCh38"),
        ].into_iter().collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_field_boundaries() {
        // shifting characters between neighbouring fields must not collide
        assert_ne!(
            derive_id("1", 100, Some(101), "AT", "G", "GRCh37"),
            derive_id("1", 100, Some(101), "A", "TG", "GRCh37")
        );
        assert_ne!(
            derive_id("1", 10, Some(101), "A", "T", "GRCh37"),
            derive_id("11", 0, Some(101), "A", "T", "GRCh37")
        );
    }
}
