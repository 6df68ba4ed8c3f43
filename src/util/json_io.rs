use anyhow::Context;
use std::io::{BufReader, BufWriter, Write};
use std::fs::File;
use std::path::{Path, PathBuf};

/// True if the path should be treated as gzip-compressed
fn is_gzip(filename: &Path) -> bool {
    filename.extension().unwrap_or_default() == "gz"
}

/// Helper function that loads a file into some type, helpful generic
/// # Arguments
/// * `filename` - the file path to open and parse, gzip if it ends in `.gz`
/// # Errors
/// * if the file does not open properly
/// * if the deserialization throws errors
pub fn load_json<T: serde::de::DeserializeOwned>(filename: &Path) -> anyhow::Result<T> {
    let file = File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;
    let fp: Box<dyn std::io::Read> = if is_gzip(filename) {
        Box::new(flate2::read::MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let result: T = serde_json::from_reader(BufReader::new(fp))
        .with_context(|| format!("Error while deserializing {filename:?}:"))?;
    Ok(result)
}

/// Saves a serializable struct to JSON.
/// The data is written to `<out_filename>.tmp` first and then renamed over the target.
/// # Arguments
/// * `data` - the data in memory
/// * `out_filename` - user provided path to write to, gzip if it ends in `.gz`
/// # Errors
/// * if opening, writing, or renaming the file throw errors
/// * if JSON serialization throws errors
pub fn save_json<T: serde::Serialize>(data: &T, out_filename: &Path) -> anyhow::Result<()> {
    let mut tmp_name = out_filename.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_filename = PathBuf::from(tmp_name);

    {
        let file = File::create(&tmp_filename)
            .with_context(|| format!("Error while creating {tmp_filename:?}:"))?;
        let file: Box<dyn std::io::Write> = if is_gzip(out_filename) {
            Box::new(flate2::write::GzEncoder::new(file, flate2::Compression::best()))
        } else {
            Box::new(file)
        };
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, data)
            .with_context(|| format!("Error while serializing {out_filename:?}:"))?;
        writer.flush()
            .with_context(|| format!("Error while flushing output to {tmp_filename:?}:"))?;
    }

    std::fs::rename(&tmp_filename, out_filename)
        .with_context(|| format!("Error while moving {tmp_filename:?} to {out_filename:?}:"))?;
    Ok(())
}
