//! Read/write scan archives.
//!
//! An archive is a single JSON document with five named entries:
//!
//! ```text
//! {
//!   "points":         { "<c1,c2>": { "<process>": [[c1, c2], ...] } },
//!   "cross_sections": { "<c1,c2>": { "<process>": [xs, ...] } },
//!   "scales":         { "<c1,c2>": { "<process>": [s, ...] }, "sm": { "<process>": xs_sm } },
//!   "fit_constants":  { "<c1,c2>": { "<process>": [k, ...] } },
//!   "fit_errs":       { "<c1,c2>": { "<process>": [pct, ...] } }
//! }
//! ```
//!
//! Coefficient tuples are stored in canonical (sorted) order, joined by commas.
//! Floats are written with enough digits to round-trip exactly. JSON has no
//! NaN or infinity, so `dump` refuses stores holding non-finite values.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{CoefficientTuple, PointsInput, ScanKey};
use crate::error::ScanError;
use crate::scan::ScanStore;

/// Delay before the single retry of a failed archive read.
pub const LOAD_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Reserved key of the per-process SM cross sections inside `scales`.
const SM_KEY: &str = "sm";

type Section<T> = BTreeMap<String, BTreeMap<String, T>>;

#[derive(Debug, Serialize, Deserialize)]
struct Archive {
    points: Section<Vec<Vec<f64>>>,
    cross_sections: Section<Vec<f64>>,
    // Producer jobs write samples only.
    #[serde(default)]
    scales: Section<ScaleValue>,
    #[serde(default)]
    fit_constants: Section<Vec<f64>>,
    #[serde(default)]
    fit_errs: Section<Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ScaleValue {
    Sm(f64),
    Scales(Vec<f64>),
}

/// Outcome of [`ScanStore::loadmany`].
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

impl ScanStore {
    /// Read a store from an archive.
    pub fn from_archive(path: &Path) -> Result<Self, ScanError> {
        let mut store = ScanStore::new();
        store.load(path)?;
        Ok(store)
    }

    /// Merge many archives into a fresh store (see [`ScanStore::loadmany`]).
    pub fn open<P: AsRef<Path>>(files: &[P]) -> (Self, LoadReport) {
        let mut store = ScanStore::new();
        let report = store.loadmany(files);
        (store, report)
    }

    /// Replace the content of the store with an archive.
    ///
    /// The store is left untouched if the archive cannot be read.
    pub fn load(&mut self, path: &Path) -> Result<(), ScanError> {
        let archive = read_archive(path, Duration::ZERO).map_err(|e| ScanError::Archive {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        *self = archive_to_store(archive)?;
        Ok(())
    }

    /// Write all five mappings to `path`.
    ///
    /// The archive is written next to `path` and renamed into place, so
    /// readers never see a partially written file.
    pub fn dump(&self, path: &Path) -> Result<(), ScanError> {
        let archive = store_to_archive(self)?;

        let mut partial = path.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let file = File::create(&partial)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &archive)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&partial, path)?;

        tracing::debug!("wrote {} scan entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Merge the points and cross sections of several archives into the store.
    ///
    /// Each file is merged with [`ScanStore::add`]. A file that cannot be read
    /// or parsed is skipped: the store is rolled back to its state before that
    /// file and the remaining files are still processed. Reads are retried
    /// once after [`LOAD_RETRY_DELAY`].
    pub fn loadmany<P: AsRef<Path>>(&mut self, files: &[P]) -> LoadReport {
        self.loadmany_with_retry_delay(files, LOAD_RETRY_DELAY)
    }

    pub fn loadmany_with_retry_delay<P: AsRef<Path>>(
        &mut self,
        files: &[P],
        retry_delay: Duration,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        for file in files {
            let path = file.as_ref();
            let snapshot = (
                self.points.clone(),
                self.cross_sections.clone(),
                self.scales.clone(),
                self.fit_constants.clone(),
                self.fit_errs.clone(),
            );

            match self.merge_file(path, retry_delay) {
                Ok(()) => report.loaded.push(path.to_path_buf()),
                Err(e) => {
                    (
                        self.points,
                        self.cross_sections,
                        self.scales,
                        self.fit_constants,
                        self.fit_errs,
                    ) = snapshot;
                    tracing::warn!("skipping bad input file {}: {}", path.display(), e);
                    report.skipped.push(SkippedFile {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            "loaded {} files, skipped {}",
            report.loaded.len(),
            report.skipped.len()
        );
        report
    }

    fn merge_file(&mut self, path: &Path, retry_delay: Duration) -> Result<(), ScanError> {
        let archive = read_archive(path, retry_delay)?;
        for (joined, processes) in &archive.points {
            let tuple = CoefficientTuple::from_joined(joined)?;
            for (process, rows) in processes {
                let xs = archive
                    .cross_sections
                    .get(joined)
                    .and_then(|m| m.get(process))
                    .ok_or_else(|| ScanKey::new(tuple.clone(), process.as_str()).missing())?;
                let points = rows_to_matrix(rows, tuple.len())?;
                self.add(PointsInput::Matrix(&points), xs, process, tuple.names())?;
            }
        }
        Ok(())
    }
}

fn read_archive(path: &Path, retry_delay: Duration) -> Result<Archive, ScanError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if !retry_delay.is_zero() => {
            tracing::warn!("will wait and then retry, got {e}");
            std::thread::sleep(retry_delay);
            fs::read_to_string(path)?
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&text)?)
}

fn rows_to_matrix(rows: &[Vec<f64>], width: usize) -> Result<DMatrix<f64>, ScanError> {
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(ScanError::ShapeMismatch(format!(
            "archive row has {} values, expected {width}",
            bad.len()
        )));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(DMatrix::from_row_slice(rows.len(), width, &flat))
}

fn matrix_to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}

fn insert<T>(section: &mut Section<T>, key: &ScanKey, value: T) {
    section
        .entry(key.coefficients.joined())
        .or_default()
        .insert(key.process.clone(), value);
}

fn ensure_finite<'a>(what: &str, key: &ScanKey, values: impl IntoIterator<Item = &'a f64>) -> Result<(), ScanError> {
    if values.into_iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ScanError::InvalidInput(format!(
            "{what} of {key} contain non-finite values and cannot be archived"
        )))
    }
}

fn store_to_archive(store: &ScanStore) -> Result<Archive, ScanError> {
    let mut archive = Archive {
        points: Section::new(),
        cross_sections: Section::new(),
        scales: Section::new(),
        fit_constants: Section::new(),
        fit_errs: Section::new(),
    };

    for (key, m) in &store.points {
        ensure_finite("points", key, m.iter())?;
        insert(&mut archive.points, key, matrix_to_rows(m));
    }
    for (key, v) in &store.cross_sections {
        ensure_finite("cross sections", key, v.iter())?;
        insert(&mut archive.cross_sections, key, v.as_slice().to_vec());
    }
    for (key, v) in &store.scales {
        ensure_finite("scales", key, v.iter())?;
        insert(&mut archive.scales, key, ScaleValue::Scales(v.as_slice().to_vec()));
    }
    for (process, &sm) in &store.sm_cross_sections {
        archive
            .scales
            .entry(SM_KEY.to_string())
            .or_default()
            .insert(process.clone(), ScaleValue::Sm(sm));
    }
    for (key, v) in &store.fit_constants {
        ensure_finite("fit constants", key, v.iter())?;
        insert(&mut archive.fit_constants, key, v.as_slice().to_vec());
    }
    for (key, v) in &store.fit_errs {
        ensure_finite("fit errors", key, v.iter())?;
        insert(&mut archive.fit_errs, key, v.as_slice().to_vec());
    }
    Ok(archive)
}

fn archive_to_store(archive: Archive) -> Result<ScanStore, ScanError> {
    let mut store = ScanStore::new();

    for (joined, processes) in archive.points {
        let tuple = CoefficientTuple::from_joined(&joined)?;
        for (process, rows) in processes {
            let m = rows_to_matrix(&rows, tuple.len())?;
            store.points.insert(ScanKey::new(tuple.clone(), process), m);
        }
    }
    store.cross_sections = vector_section(archive.cross_sections)?;
    store.fit_constants = vector_section(archive.fit_constants)?;
    store.fit_errs = vector_section(archive.fit_errs)?;

    for (joined, processes) in archive.scales {
        for (process, value) in processes {
            match value {
                ScaleValue::Sm(sm) if joined == SM_KEY => {
                    store.sm_cross_sections.insert(process, sm);
                }
                ScaleValue::Scales(values) => {
                    let tuple = CoefficientTuple::from_joined(&joined)?;
                    store
                        .scales
                        .insert(ScanKey::new(tuple, process), DVector::from_vec(values));
                }
                ScaleValue::Sm(_) => {
                    return Err(ScanError::InvalidInput(format!(
                        "scalar scale for {joined} / {process} outside the '{SM_KEY}' entry"
                    )));
                }
            }
        }
    }

    for (key, m) in &store.points {
        let rows = store.cross_sections.get(key).map(|v| v.len());
        if rows != Some(m.nrows()) {
            return Err(ScanError::ShapeMismatch(format!(
                "{key}: {} points but {:?} cross sections",
                m.nrows(),
                rows
            )));
        }
    }
    Ok(store)
}

fn vector_section(section: Section<Vec<f64>>) -> Result<BTreeMap<ScanKey, DVector<f64>>, ScanError> {
    let mut out = BTreeMap::new();
    for (joined, processes) in section {
        let tuple = CoefficientTuple::from_joined(&joined)?;
        for (process, values) in processes {
            out.insert(ScanKey::new(tuple.clone(), process), DVector::from_vec(values));
        }
    }
    Ok(out)
}
