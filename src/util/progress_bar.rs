use indicatif::{ProgressBar, ProgressState, ProgressStyle};

/// Shared function to pull our progress bar styling
pub fn get_progress_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} records ({percent}); ETA: {eta_precise}; Speed: {per_sec} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("percent", |state: &ProgressState, w: &mut dyn std::fmt::Write| { let _ = write!(w, "{:.1}%", state.fraction()*100.0); })
        .with_key("per_sec", |state: &ProgressState, w: &mut dyn std::fmt::Write| { let _ = write!(w, "{:.0}/s", state.per_sec()); })
        .progress_chars("##-")
}

/// Bar for an ingestion run; a spinner when the total is unknown
pub fn ingest_progress_bar(total_records: Option<u64>) -> ProgressBar {
    match total_records {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(get_progress_style());
            bar
        },
        None => ProgressBar::new_spinner()
    }
}
