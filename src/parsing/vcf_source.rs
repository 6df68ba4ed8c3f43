use anyhow::{anyhow, bail, Context};
use log::{debug, trace, warn};
use noodles::vcf;
use noodles::vcf::variant::record::info::field::key as info_key;
use noodles::vcf::variant::record::samples::keys::key as vcf_key;
use noodles::vcf::variant::record_buf::info::field::Value as InfoValue;
use noodles::vcf::variant::record_buf::samples::sample::Value as SampleValue;
use noodles::vcf::variant::record_buf::samples::sample::value::genotype::Genotype;
use std::collections::VecDeque;
use std::path::Path;
use std::str::FromStr;

use crate::data_types::variants::{RawVariantRecord, SvType};
use crate::parsing::noodles_helper::{open_vcf_file, SendBufRead};
use crate::parsing::region_filter::RegionFilter;

/// INFO key carrying the 1-based inclusive end of structural variants
const END_KEY: &str = "END";
/// ALT used for a spanning deletion, which is never its own variant
const SPANNING_DELETION: &str = "*";

/// Lazily converts a VCF into `RawVariantRecord`s, one per ALT allele.
/// Restart by opening the file again.
pub struct VcfRecordSource {
    /// The underlying reader, positioned after the header
    vcf_reader: vcf::io::Reader<SendBufRead>,
    /// Parsed header, needed for every record read
    vcf_header: vcf::Header,
    /// Sample names in file order
    sample_names: Vec<String>,
    /// Re-used buffer for the records
    record_buf: vcf::variant::RecordBuf,
    /// Records split from a multi-allelic line that have not been handed out yet
    pending: VecDeque<RawVariantRecord>,
    /// Optional panel restriction
    region_filter: Option<RegionFilter>,
    /// Number of VCF lines read so far
    lines_read: u64
}

impl std::fmt::Debug for VcfRecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcfRecordSource")
            .field("sample_names", &self.sample_names)
            .field("region_filter", &self.region_filter)
            .field("lines_read", &self.lines_read)
            .finish()
    }
}

impl VcfRecordSource {
    /// Opens a VCF and reads the header
    /// # Arguments
    /// * `vcf_fn` - path to the .vcf(.gz) file
    /// # Errors
    /// * if the file cannot be opened or the header cannot be parsed
    pub fn from_path(vcf_fn: &Path) -> anyhow::Result<Self> {
        let (vcf_reader, vcf_header) = open_vcf_file(vcf_fn)?;
        let sample_names: Vec<String> = vcf_header.sample_names().iter().cloned().collect();
        debug!("Opened {vcf_fn:?} with {} samples", sample_names.len());
        Ok(Self {
            vcf_reader,
            vcf_header,
            sample_names,
            record_buf: Default::default(),
            pending: Default::default(),
            region_filter: None,
            lines_read: 0
        })
    }

    /// Only records overlapping a region of `region_filter` are returned
    pub fn with_region_filter(mut self, region_filter: RegionFilter) -> Self {
        self.region_filter = Some(region_filter);
        self
    }

    // getters
    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Reads the next VCF line into the pending queue.
    /// Returns false once the file is exhausted.
    fn fill_pending(&mut self) -> anyhow::Result<bool> {
        let bytes_read = self.vcf_reader.read_record_buf(&self.vcf_header, &mut self.record_buf)
            .with_context(|| format!("Error while reading VCF record after line {}:", self.lines_read))?;
        if bytes_read == 0 {
            return Ok(false);
        }
        self.lines_read += 1;

        let records = split_record(&self.record_buf, &self.sample_names)
            .with_context(|| format!("Error parsing variants in {:?}:", self.record_buf))?;
        for record in records.into_iter() {
            let keep = match self.region_filter.as_ref() {
                Some(filter) => filter.contains_variant(&record.chromosome, record.start, record.end),
                None => true
            };
            if keep {
                self.pending.push_back(record);
            } else {
                trace!("Outside of regions: {}:{}", record.chromosome, record.start);
            }
        }
        Ok(true)
    }
}

impl Iterator for VcfRecordSource {
    type Item = anyhow::Result<RawVariantRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            match self.fill_pending() {
                Ok(true) => {},
                Ok(false) => return None,
                Err(e) => return Some(Err(e))
            }
        }
    }
}

/// Counts the data lines in a VCF, used to size the progress bar.
/// # Arguments
/// * `vcf_fn` - path to the .vcf(.gz) file
pub fn count_records(vcf_fn: &Path) -> anyhow::Result<u64> {
    let (mut vcf_reader, vcf_header) = open_vcf_file(vcf_fn)?;
    let mut record_buf = vcf::variant::RecordBuf::default();
    let mut count = 0;
    while vcf_reader.read_record_buf(&vcf_header, &mut record_buf)? > 0 {
        count += 1;
    }
    Ok(count)
}

/// Splits one VCF line into a record per ALT allele.
/// Returns nothing for lines with an SVTYPE we do not model.
/// # Arguments
/// * `record` - the parsed VCF line
/// * `sample_names` - header sample names, in column order
fn split_record(record: &vcf::variant::RecordBuf, sample_names: &[String]) -> anyhow::Result<Vec<RawVariantRecord>> {
    let chrom = record.reference_sequence_name();
    let pos = record.variant_start().ok_or(anyhow!("Missing POS"))?; // 1-based
    let start = (pos.get() - 1) as u64;
    let ref_seq = record.reference_bases();

    let variant_type = match record.info().get(info_key::SV_TYPE) {
        Some(Some(InfoValue::String(sv_type))) => {
            match SvType::from_str(sv_type) {
                Ok(vt) => Some(vt),
                Err(_) => {
                    warn!("Skipping {chrom}:{pos} with unsupported SVTYPE={sv_type}");
                    return Ok(vec![]);
                }
            }
        },
        Some(Some(other)) => bail!("Unexpected SVTYPE value: {other:?}"),
        _ => None
    };

    let end = match variant_type {
        Some(_) => {
            // END is 1-based inclusive, which is the same number as a 0-based exclusive end
            match record.info().get(END_KEY) {
                Some(Some(InfoValue::Integer(end))) => u64::try_from(*end).ok(),
                _ => None
            }
        },
        None => Some(start + ref_seq.len() as u64)
    };

    let sample_alleles: Vec<Vec<usize>> = (0..sample_names.len())
        .map(|sample_index| genotype_alleles(record, sample_index))
        .collect::<anyhow::Result<_>>()?;

    let mut ret = vec![];
    for (alt_offset, alt_seq) in record.alternate_bases().as_ref().iter().enumerate() {
        if alt_seq == SPANNING_DELETION {
            continue;
        }

        // GT allele 0 is the reference, so ALTs start at 1
        let alt_index = alt_offset + 1;
        let genotype_calls = sample_names.iter()
            .zip(sample_alleles.iter())
            .map(|(name, alleles)| {
                let calls = alleles.iter().filter(|&&a| a == alt_index).count() as u64;
                (name.clone(), calls)
            })
            .collect();

        let mate_name = if variant_type == Some(SvType::Breakend) {
            breakend_mate(alt_seq)
        } else {
            None
        };

        ret.push(RawVariantRecord {
            chromosome: chrom.to_string(),
            start,
            end,
            reference_bases: ref_seq.to_string(),
            alternate_bases: alt_seq.clone(),
            variant_type,
            mate_name,
            genotype_calls
        });
    }
    trace!("{chrom}\t{pos}\t{ref_seq}\t=> {} records", ret.len());
    Ok(ret)
}

/// Returns the called allele indices for a sample, skipping missing alleles.
/// A sample without a GT is treated as a no-call.
/// # Arguments
/// * `record` - the parsed VCF line
/// * `sample_index` - column of the sample
fn genotype_alleles(record: &vcf::variant::RecordBuf, sample_index: usize) -> anyhow::Result<Vec<usize>> {
    let sample = match record.samples().get_index(sample_index) {
        Some(s) => s,
        None => return Ok(vec![])
    };

    let alleles = match sample.get(vcf_key::GENOTYPE) {
        Some(Some(SampleValue::Genotype(genotype))) => {
            genotype.as_ref().iter().filter_map(|a| a.position()).collect()
        },
        Some(Some(SampleValue::String(text))) => {
            let genotype = Genotype::from_str(text)
                .with_context(|| format!("Error while parsing GT {text:?}"))?;
            genotype.as_ref().iter().filter_map(|a| a.position()).collect()
        },
        Some(Some(other)) => bail!("Unexpected GT value: {other:?}"),
        _ => vec![]
    };
    Ok(alleles)
}

/// Pulls the mate chromosome out of breakend ALT notation, e.g. `G]17:198982]` or `[13:123456[T`
fn breakend_mate(alt_seq: &str) -> Option<String> {
    let open = alt_seq.find(|c| c == '[' || c == ']')?;
    let locus = &alt_seq[open + 1..];
    let colon = locus.find(':')?;
    let mate = &locus[..colon];
    if mate.is_empty() {
        None
    } else {
        Some(mate.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn load_all(source: VcfRecordSource) -> Vec<RawVariantRecord> {
        source.collect::<anyhow::Result<Vec<_>>>().unwrap()
    }

    fn calls(record: &RawVariantRecord) -> Vec<u64> {
        ["proband", "mother", "father"].iter()
            .map(|s| record.genotype_calls[*s])
            .collect()
    }

    #[test]
    fn test_breakend_mate() {
        assert_eq!(breakend_mate("G]17:198982]"), Some("17".to_string()));
        assert_eq!(breakend_mate("]chr13:123456]T"), Some("chr13".to_string()));
        assert_eq!(breakend_mate("[chrX:5[T"), Some("chrX".to_string()));
        assert_eq!(breakend_mate("<DEL>"), None);
        assert_eq!(breakend_mate("A"), None);
        assert_eq!(breakend_mate("A[:5["), None);
    }

    #[test]
    fn test_trio() {
        let vcf_fn = PathBuf::from("test_data/trio.vcf");
        let source = VcfRecordSource::from_path(&vcf_fn).unwrap();
        assert_eq!(source.sample_names(), &["proband", "mother", "father"]);
        let records = load_all(source);

        // the CNV line is dropped, the multi-allelic line is split in two
        assert_eq!(records.len(), 8);

        let snv = &records[0];
        assert_eq!(snv.chromosome, "chr1");
        assert_eq!(snv.start, 100);
        assert_eq!(snv.end, Some(101));
        assert_eq!(snv.reference_bases, "A");
        assert_eq!(snv.alternate_bases, "T");
        assert_eq!(snv.variant_type, None);
        assert_eq!(calls(snv), vec![1, 2, 0]);

        // 1/2 0/1 ./.
        let (first_alt, second_alt) = (&records[1], &records[2]);
        assert_eq!(first_alt.start, 150);
        assert_eq!(first_alt.alternate_bases, "G");
        assert_eq!(calls(first_alt), vec![1, 1, 0]);
        assert_eq!(second_alt.alternate_bases, "CT");
        assert_eq!(second_alt.end, Some(151));
        assert_eq!(calls(second_alt), vec![1, 0, 0]);

        // phased father
        assert_eq!(calls(&records[3]), vec![0, 0, 1]);

        let deletion = &records[4];
        assert_eq!(deletion.variant_type, Some(SvType::Deletion));
        assert_eq!(deletion.start, 5100);
        assert_eq!(deletion.end, Some(5300));
        assert_eq!(deletion.alternate_bases, "<DEL>");

        let breakend = &records[5];
        assert_eq!(breakend.variant_type, Some(SvType::Breakend));
        assert_eq!(breakend.end, None);
        assert_eq!(breakend.mate_name.as_deref(), Some("chr3"));
        assert_eq!(calls(breakend), vec![1, 1, 0]);

        let unplaced = &records[6];
        assert_eq!(unplaced.chromosome, "chrUn_gl000220");
        assert_eq!(calls(unplaced), vec![2, 0, 0]);

        assert_eq!(records[7].start, 2000);
    }

    #[test]
    fn test_region_filter() {
        let filter = RegionFilter::from_bed(&PathBuf::from("test_data/panel.bed")).unwrap();
        let source = VcfRecordSource::from_path(&PathBuf::from("test_data/trio.vcf")).unwrap()
            .with_region_filter(filter);
        let records = load_all(source);
        let starts: Vec<u64> = records.iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![100, 150, 150, 1050, 5100, 5500]);
    }

    #[test]
    fn test_count_records() {
        assert_eq!(count_records(&PathBuf::from("test_data/trio.vcf")).unwrap(), 8);
    }
}
