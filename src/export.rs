//! CSV output of policy and value grids.
//!
//! Each grid has a header row of site #2 counts; every following row starts
//! with a site #1 count. Plotting tools read these files to draw heatmaps.

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::debug;

use crate::error::SolveError;
use crate::iteration::RoundObserver;
use crate::policy::{Policy, ValueFunction};

/// Write `grid` as CSV. Rows are cars at site #1, columns cars at site #2.
pub fn write_grid<W: io::Write, T: Display>(writer: W, grid: &Array2<T>) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    let header = std::iter::once(String::from("n1\\n2"))
        .chain((0..grid.ncols()).map(|n2| n2.to_string()));
    wtr.write_record(header)?;
    for (n1, row) in grid.rows().into_iter().enumerate() {
        let record = std::iter::once(n1.to_string())
            .chain(row.iter().map(|v| v.to_string()));
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Saves `policy_round{N}.csv` after every round and `values.csv` at the end.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl CsvExporter {
    pub fn new(dir: impl AsRef<Path>) -> Result<CsvExporter, SolveError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(CsvExporter { dir: dir.as_ref().to_path_buf(), written: Vec::new() })
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn save<T: Display>(&mut self, name: String, grid: &Array2<T>) -> Result<(), SolveError> {
        let path = self.dir.join(name);
        write_grid(fs::File::create(&path)?, grid)?;
        debug!(path = %path.display(), "wrote grid");
        self.written.push(path);
        Ok(())
    }
}

impl RoundObserver for CsvExporter {
    fn on_policy(&mut self, round: usize, policy: &Policy) -> Result<(), SolveError> {
        self.save(format!("policy_round{round}.csv"), &policy.actions)
    }

    fn on_values(&mut self, values: &ValueFunction) -> Result<(), SolveError> {
        let rounded = values.values.mapv(|v| format!("{v:.3}"));
        self.save(String::from("values.csv"), &rounded)
    }
}
