use anyhow::anyhow;
use coitrees::{COITree, Interval, IntervalTree};
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

use crate::identity::canonical_chromosome;
use crate::parsing::noodles_helper::LoadedBed;

/// Gene panel / region restriction for ingestion, loaded from a BED file.
/// Lookups are keyed by canonical chromosome name.
#[derive(Clone)]
pub struct RegionFilter {
    /// Lookup from a chromosome to a COITree, which has 0-based inclusive ranges
    lookup_trees: BTreeMap<String, COITree<(), usize>>
}

impl std::fmt::Debug for RegionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // COITree does not have Debug, so lets just convert it to a length for simplicity
        let lookup_counts: BTreeMap<String, usize> = self.lookup_trees.iter()
            .map(|(s, c)| {
                (s.clone(), c.len())
            })
            .collect();
        f.debug_struct("RegionFilter").field("lookup_trees_len", &lookup_counts).finish()
    }
}

impl RegionFilter {
    /// Loads a BED file and converts all the entries to the COI trees for lookup
    /// # Arguments
    /// * `bed_fn` - path to the .bed(.gz) file
    pub fn from_bed(bed_fn: &Path) -> anyhow::Result<Self> {
        let loaded_bed = LoadedBed::preload_bed_file(bed_fn)?;

        let mut lookup_trees: BTreeMap<String, COITree<(), usize>> = Default::default();
        let mut total_intervals = 0;
        for (chrom, intervals) in loaded_bed.chrom_lookup().iter() {
            let coi_intervals: Vec<Interval<()>> = intervals.iter()
                .map(|i| {
                    // the positions are 1-based inclusive
                    // convert to 0-based inclusive
                    let start = i.start().ok_or(anyhow!("Missing start"))?.get() as i32 - 1;
                    let end = i.end().ok_or(anyhow!("Missing end"))?.get() as i32 - 1;
                    Ok(Interval::new(start, end, ()))
                })
                .collect::<anyhow::Result<_>>()?;
            total_intervals += coi_intervals.len();
            lookup_trees.insert(chrom.clone(), COITree::new(&coi_intervals));
        }

        info!("Loaded {total_intervals} regions on {} chromosomes from {bed_fn:?}", lookup_trees.len());
        Ok(Self {
            lookup_trees
        })
    }

    /// Returns true if the provided interval overlaps at least one region.
    /// These are based on 0-based inclusive lookups.
    /// # Arguments
    /// * `chrom` - the chromosome, any supported alias
    /// * `first` - the first included base, 0-based
    /// * `last` - the last included base, 0-based
    pub fn is_overlapping(&self, chrom: &str, first: u64, last: u64) -> bool {
        let first = i32::try_from(first).unwrap_or(i32::MAX);
        let last = i32::try_from(last).unwrap_or(i32::MAX);
        match self.lookup_trees.get(&canonical_chromosome(chrom)) {
            Some(coi_tree) => {
                coi_tree.query_count(first, last) > 0
            },
            None => false
        }
    }

    /// Checks a variant spanning `[start, end)`; a missing or empty end is treated as a single base
    pub fn contains_variant(&self, chrom: &str, start: u64, end: Option<u64>) -> bool {
        let last = match end {
            Some(e) if e > start => e - 1,
            _ => start
        };
        self.is_overlapping(chrom, start, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_panel() {
        // panel.bed: chr1 [100, 200), chr1 [1000, 1100), chr2 [5000, 6000)
        let filter = RegionFilter::from_bed(&PathBuf::from("test_data/panel.bed")).unwrap();
        assert!(filter.is_overlapping("1", 100, 100));
        assert!(filter.is_overlapping("chr1", 199, 199));
        assert!(!filter.is_overlapping("1", 200, 200));
        assert!(!filter.is_overlapping("1", 99, 99));
        assert!(filter.is_overlapping("1", 50, 150));
        assert!(filter.is_overlapping("2", 5500, 5500));
        assert!(!filter.is_overlapping("3", 5500, 5500));

        // [95, 100) stops right before the region
        assert!(!filter.contains_variant("1", 95, Some(100)));
        assert!(filter.contains_variant("1", 95, Some(101)));
        assert!(filter.contains_variant("1", 1050, None));
    }
}
