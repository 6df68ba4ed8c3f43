use anyhow::Context;
use indexmap::IndexMap;
use log::debug;
use noodles::bed::io::reader::Builder as BedBuilder;
use noodles::bed::{io::Reader as BedReader, Record as BedRecord};
use noodles::core::region::Interval;
use noodles::core::Position;
use noodles::vcf;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::identity::canonical_chromosome;

/// Any buffered input we can hand across threads
pub type SendBufRead = Box<dyn BufRead + Send>;

/// True if the path ends in `.gz`
fn is_compressed(filename: &Path) -> bool {
    match filename.extension() {
        Some(extension) => {
            extension == "gz"
        },
        None => false
    }
}

/// Opens a file that may be bgzip compressed.
/// # Arguments
/// * `filename` - path to open; `.gz` files are read through the BGZF reader
fn open_maybe_bgzf(filename: &Path) -> anyhow::Result<SendBufRead> {
    let reader: SendBufRead = if is_compressed(filename) {
        #[allow(clippy::default_constructed_unit_structs)]
        let bgzf_reader = noodles::bgzf::io::reader::Builder::default()
            .build_from_path(filename)
            .with_context(|| format!("Error while loading {filename:?}:"))?;
        Box::new(BufReader::new(bgzf_reader))
    } else {
        let file = std::fs::File::open(filename)
            .with_context(|| format!("Error while opening {filename:?}:"))?;
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Wrapper function that handles both gzip compressed and uncompressed BED files
/// # Arguments
/// * `filename` - path to the .bed(.gz) file to open
pub fn open_bed_file(filename: &Path) -> anyhow::Result<BedReader<3, BufReader<SendBufRead>>> {
    let buf_reader = open_maybe_bgzf(filename)?;
    #[allow(clippy::default_constructed_unit_structs)]
    let bed_reader = BedBuilder::<3>::default()
        .build_from_reader(buf_reader);
    Ok(bed_reader)
}

/// Opens a plain or bgzipped VCF and reads its header.
/// The reader is `Send` so it can feed a parallel ingestion.
/// # Arguments
/// * `filename` - path to the .vcf(.gz) file to open
/// # Errors
/// * if the file cannot be opened or the header is malformed
pub fn open_vcf_file(filename: &Path) -> anyhow::Result<(vcf::io::Reader<SendBufRead>, vcf::Header)> {
    let mut vcf_reader = vcf::io::Reader::new(open_maybe_bgzf(filename)?);
    let vcf_header = vcf_reader.read_header()
        .with_context(|| format!("Error while reading header of {filename:?}:"))?;
    Ok((vcf_reader, vcf_header))
}

/// A pre-loaded BED file where chromosome order is supported and the intervals are sorted.
/// Chromosome names are canonicalized on load so `chr1` and `1` land together.
pub struct LoadedBed {
    /// Map from chromosome to the sorted intervals
    chrom_lookup: IndexMap<String, Vec<Interval>>
}

impl LoadedBed {
    /// This will load an entire BED file into memory, preserving chromosome order but also sorting any intervals if they are not sorted already.
    /// # Arguments
    /// * `filename` - path to the .bed(.gz) file to open
    pub fn preload_bed_file(filename: &Path) -> anyhow::Result<Self> {
        debug!("Pre-loading {filename:?}...");
        let mut bed_handle = open_bed_file(filename)?;

        let mut record = BedRecord::<3>::default();
        let mut chrom_lookup: IndexMap<String, Vec<(Position, Position)>> = Default::default();
        while bed_handle.read_record(&mut record)? > 0 {
            let chrom = canonical_chromosome(&record.reference_sequence_name().to_string());
            let start = record.feature_start()
                .with_context(|| format!("Error while parsing start for record: {record:?}"))?;
            let end = record.feature_end()
                .unwrap_or(Err(std::io::Error::other("Missing end")))
                .with_context(|| format!("Error while parsing end for record: {record:?}"))?;
            chrom_lookup.entry(chrom).or_default().push((start, end));
        }

        // sort all the intervals, then convert to noodles intervals
        let chrom_lookup = chrom_lookup.into_iter()
            .map(|(chrom, mut bounds)| {
                let num_entries = bounds.len();
                if !bounds.is_sorted() {
                    debug!("Sorting {num_entries} BED entries for {chrom}...");
                    bounds.sort();
                } else {
                    debug!("Found {num_entries} sorted BED entries for {chrom}.");
                }
                let intervals = bounds.into_iter()
                    .map(|(start, end)| Interval::from(start..=end))
                    .collect();
                (chrom, intervals)
            })
            .collect();

        Ok(Self {
            chrom_lookup
        })
    }

    // getters
    pub fn chrom_lookup(&self) -> &IndexMap<String, Vec<Interval>> {
        &self.chrom_lookup
    }
}

/// Returns every sample name in a VCF/BCF header, in file order.
/// # Arguments
/// * `vcf_fn` - the VCF filename to open
pub fn sample_names(vcf_fn: &Path) -> anyhow::Result<Vec<String>> {
    use noodles_util::variant::io::reader::Builder as VcfBuilder;

    let mut vcf_reader = VcfBuilder::default()
        .build_from_path(vcf_fn)
        .with_context(|| format!("Error while opening {vcf_fn:?}:"))?;
    let vcf_header = vcf_reader.read_header()
        .with_context(|| format!("Error while reading header of {vcf_fn:?}:"))?;

    Ok(vcf_header.sample_names().iter().cloned().collect())
}
