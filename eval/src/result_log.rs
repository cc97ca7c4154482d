//! The per-run result file: parameter header, one line per pair, summary.

use crate::confusion::{ConfusionMatrix, Outcome};
use crate::params::RunParameters;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only result log, flushed after every write so that an abandoned
/// run still leaves every finished pair on disk.
///
/// [`ResultLog::finalize`] consumes the log, so the summary is written and
/// the handle closed exactly once.
pub struct ResultLog<W: Write = BufWriter<File>> {
    writer: W,
}

impl ResultLog {
    /// Create `<dir>/<params.result_file_name()>`, replacing an older run.
    pub fn create(dir: &Path, params: &RunParameters) -> io::Result<(Self, PathBuf)> {
        let path = dir.join(params.result_file_name());
        let file = File::create(&path)?;
        let log = Self::from_writer(BufWriter::new(file), params)?;
        Ok((log, path))
    }
}

impl<W: Write> ResultLog<W> {
    pub fn from_writer(mut writer: W, params: &RunParameters) -> io::Result<Self> {
        writeln!(writer, "Parameters: ")?;
        for line in params.describe() {
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn record_pair(
        &mut self,
        scene: &str,
        model: &str,
        correspondences: usize,
        hypotheses: usize,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "{scene} <<<>>> {model} : {correspondences} -> {hypotheses}"
        )?;
        self.writer.flush()
    }

    /// Write the summary and close the log, returning the underlying writer.
    pub fn finalize(mut self, counters: &ConfusionMatrix, skipped: u64) -> io::Result<W> {
        writeln!(self.writer)?;
        writeln!(self.writer, "Total iterations : {}", counters.total())?;
        writeln!(self.writer, "Skipped pairs : {skipped}")?;
        for outcome in Outcome::ALL {
            let rate = counters
                .rate(outcome)
                .map_or_else(|| "n/a".to_string(), |r| r.to_string());
            writeln!(
                self.writer,
                "{outcome}: {}\tRate:  {rate}",
                counters.count(outcome)
            )?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}
