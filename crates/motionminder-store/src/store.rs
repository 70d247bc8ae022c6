//! Odometer Store
//!
//! Durable per-axis distance and maintenance state.
//!
//! Records live in memory behind one lock per axis; every mutation is
//! followed by a full snapshot write (temp file, fsync, rename) so a crash
//! leaves either the previous or the new snapshot on disk. When a travel
//! write fails the in-memory values are kept and the store is marked dirty,
//! so the next successful write carries the accumulated distance. Operator
//! overrides and history merges are written first and only then committed.

use crate::record::OdometerRecord;
use chrono::{DateTime, Utc};
use motionminder_core::{
    Axis, AxisMap, AxisSet, CommandError, DistanceUnit, Error, MergePolicy, Result, StoreError,
};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

const SNAPSHOT_VERSION: u32 = 1;

/// On-disk document
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    axes: BTreeMap<Axis, OdometerRecord>,
}

/// Durable odometer state for all tracked axes
pub struct OdometerStore {
    path: PathBuf,
    records: AxisMap<Mutex<OdometerRecord>>,
    write_lock: Mutex<()>,
    dirty: AtomicBool,
}

impl std::fmt::Debug for OdometerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdometerStore")
            .field("path", &self.path)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl OdometerStore {
    /// Open the store at `path`, creating a zeroed snapshot when none exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let store = if path.exists() {
            let records = load_snapshot(&path)?;
            tracing::info!("Loaded odometer store from {}", path.display());
            Self::with_records(path, records)
        } else {
            tracing::info!(
                "No odometer store at {}, starting from zero",
                path.display()
            );
            let store = Self::with_records(path, AxisMap::default());
            store.persist()?;
            store
        };
        Ok(store)
    }

    fn with_records(path: PathBuf, records: AxisMap<OdometerRecord>) -> Self {
        Self {
            path,
            records: AxisMap::from_fn(|axis| Mutex::new(records[axis].clone())),
            write_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Snapshot file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when in-memory state has not reached disk yet
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Current state of one axis
    pub fn get(&self, axis: Axis) -> OdometerRecord {
        self.records[axis].lock().clone()
    }

    /// Current state of every axis
    pub fn snapshot(&self) -> AxisMap<OdometerRecord> {
        AxisMap::from_fn(|axis| self.get(axis))
    }

    pub fn is_maintenance_due(&self, axis: Axis) -> bool {
        self.records[axis].lock().is_maintenance_due()
    }

    /// Add travel to one axis; the magnitude of `delta_mm` is accumulated
    pub fn add_distance(&self, axis: Axis, delta_mm: f64) -> Result<OdometerRecord> {
        let mut deltas = AxisMap::splat(0.0);
        deltas[axis] = delta_mm;
        self.add_distances(&deltas)?;
        Ok(self.get(axis))
    }

    /// Add travel to every axis with a single persistence write
    ///
    /// The in-memory totals are updated even when the write fails.
    pub fn add_distances(&self, deltas: &AxisMap<f64>) -> Result<()> {
        if let Some((axis, delta)) = deltas.iter().find(|(_, d)| !d.is_finite()) {
            return Err(CommandError::invalid_value(format!(
                "distance delta for {} must be finite, got {}",
                axis, delta
            ))
            .into());
        }
        if deltas.is_zero() {
            return Ok(());
        }

        for (axis, delta) in deltas.iter() {
            if *delta == 0.0 {
                continue;
            }
            let mut record = self.records[axis].lock();
            record.total_distance_mm += delta.abs();
            record.touch();
        }
        self.mark_dirty_and_persist()
    }

    /// Set the odometer of one axis
    pub fn set_odometer(
        &self,
        axis: Axis,
        value: f64,
        unit: DistanceUnit,
        relative: bool,
    ) -> Result<OdometerRecord> {
        self.set_odometers(AxisSet::empty().with(axis), value, unit, relative)?;
        Ok(self.get(axis))
    }

    /// Set the odometer of several axes; nothing changes if any axis would go negative
    pub fn set_odometers(
        &self,
        axes: AxisSet,
        value: f64,
        unit: DistanceUnit,
        relative: bool,
    ) -> Result<()> {
        let value_mm = finite_mm(value, unit)?;
        self.update_axes(axes, |axis, record| {
            let total = if relative {
                record.total_distance_mm + value_mm
            } else {
                value_mm
            };
            if total < 0.0 {
                return Err(CommandError::invalid_value(format!(
                    "odometer for {} would become negative ({:.3} mm)",
                    axis, total
                )));
            }
            Ok(OdometerRecord {
                total_distance_mm: total,
                ..record.clone()
            })
        })
    }

    /// Set the maintenance threshold of one axis
    pub fn set_maintenance(
        &self,
        axis: Axis,
        value: f64,
        unit: DistanceUnit,
        relative: bool,
    ) -> Result<OdometerRecord> {
        self.set_maintenances(AxisSet::empty().with(axis), value, unit, relative)?;
        Ok(self.get(axis))
    }

    /// Set the maintenance threshold of several axes
    ///
    /// A relative value is added to the current odometer; the result is
    /// stored as an absolute target either way.
    pub fn set_maintenances(
        &self,
        axes: AxisSet,
        value: f64,
        unit: DistanceUnit,
        relative: bool,
    ) -> Result<()> {
        let value_mm = finite_mm(value, unit)?;
        self.update_axes(axes, |axis, record| {
            let threshold = if relative {
                record.total_distance_mm + value_mm
            } else {
                value_mm
            };
            if threshold < 0.0 {
                return Err(CommandError::invalid_value(format!(
                    "maintenance threshold for {} would become negative ({:.3} mm)",
                    axis, threshold
                )));
            }
            Ok(OdometerRecord {
                maintenance_threshold_mm: Some(threshold),
                maintenance_set_at_mm: Some(record.total_distance_mm),
                ..record.clone()
            })
        })
    }

    /// Apply a recomputed history total to the live odometer
    pub fn merge_history(&self, totals: &AxisMap<f64>, policy: MergePolicy) -> Result<()> {
        if let Some((axis, total)) = totals.iter().find(|(_, t)| !t.is_finite() || **t < 0.0) {
            return Err(CommandError::invalid_value(format!(
                "history distance for {} must be finite and non-negative, got {}",
                axis, total
            ))
            .into());
        }
        self.update_axes(AxisSet::all(), |axis, record| {
            let total = match policy {
                MergePolicy::Add => record.total_distance_mm + totals[axis],
                MergePolicy::Replace => totals[axis],
            };
            Ok(OdometerRecord {
                total_distance_mm: total,
                ..record.clone()
            })
        })
    }

    /// Persist pending state if a previous write failed
    pub fn flush(&self) -> Result<()> {
        if self.is_dirty() {
            self.persist()?;
        }
        Ok(())
    }

    /// Lock `axes` in canonical order, compute every new record, write, then commit
    ///
    /// Operator overrides reach memory only after the snapshot carrying them
    /// is on disk, so a failed write leaves the previous values in place.
    fn update_axes<F>(&self, axes: AxisSet, mut update: F) -> Result<()>
    where
        F: FnMut(Axis, &OdometerRecord) -> std::result::Result<OdometerRecord, CommandError>,
    {
        if axes.is_empty() {
            return Err(CommandError::InvalidAxis {
                axis: String::new(),
            }
            .into());
        }

        // Same lock order as persist(): writer first, then records.
        let _write = self.write_lock.lock();
        let mut guards: Vec<(Axis, MutexGuard<'_, OdometerRecord>)> = axes
            .iter()
            .map(|axis| (axis, self.records[axis].lock()))
            .collect();

        let mut updated = Vec::with_capacity(guards.len());
        for (axis, guard) in &guards {
            let mut record = update(*axis, guard)?;
            record.touch();
            updated.push(record);
        }

        let mut records: BTreeMap<Axis, OdometerRecord> = Axis::ALL
            .iter()
            .filter(|axis| !axes.contains(**axis))
            .map(|axis| (*axis, self.get(*axis)))
            .collect();
        for ((axis, _), record) in guards.iter().zip(&updated) {
            records.insert(*axis, record.clone());
        }
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            axes: records,
        };

        if let Err(err) = write_snapshot(&self.path, &snapshot) {
            tracing::error!("Odometer change rejected, store not writable: {}", err);
            return Err(err.into());
        }

        for ((_, guard), record) in guards.iter_mut().zip(updated) {
            **guard = record;
        }
        self.dirty.store(false, Ordering::SeqCst);
        tracing::debug!("Odometer store written to {}", self.path.display());
        Ok(())
    }

    fn mark_dirty_and_persist(&self) -> Result<()> {
        self.dirty.store(true, Ordering::SeqCst);
        self.persist()
    }

    /// Write the full snapshot: temp file, fsync, rename over the old one
    fn persist(&self) -> Result<()> {
        let _write = self.write_lock.lock();
        self.dirty.store(false, Ordering::SeqCst);

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            axes: Axis::ALL.iter().map(|axis| (*axis, self.get(*axis))).collect(),
        };

        if let Err(err) = write_snapshot(&self.path, &snapshot) {
            self.dirty.store(true, Ordering::SeqCst);
            tracing::error!("Odometer not persisted, will retry on next write: {}", err);
            return Err(err.into());
        }

        tracing::debug!("Odometer store written to {}", self.path.display());
        Ok(())
    }
}

fn finite_mm(value: f64, unit: DistanceUnit) -> std::result::Result<f64, CommandError> {
    if !value.is_finite() {
        return Err(CommandError::invalid_value(format!(
            "{} is not a finite number",
            value
        )));
    }
    Ok(unit.to_mm(value))
}

fn load_snapshot(path: &Path) -> std::result::Result<AxisMap<OdometerRecord>, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::LoadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(StoreError::Corrupted {
            path: path.display().to_string(),
            reason: format!("unsupported snapshot version {}", snapshot.version),
        });
    }

    let mut records: AxisMap<OdometerRecord> = AxisMap::default();
    for (axis, record) in snapshot.axes {
        if !record.total_distance_mm.is_finite() || record.total_distance_mm < 0.0 {
            return Err(StoreError::Corrupted {
                path: path.display().to_string(),
                reason: format!("invalid odometer for {}: {}", axis, record.total_distance_mm),
            });
        }
        records[axis] = record;
    }
    Ok(records)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> std::result::Result<(), StoreError> {
    let save_failed = |reason: String| StoreError::SaveFailed {
        path: path.display().to_string(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(snapshot).map_err(|e| save_failed(e.to_string()))?;
    let temp = temp_path(path);
    {
        let mut file = File::create(&temp).map_err(|e| save_failed(e.to_string()))?;
        file.write_all(json.as_bytes())
            .map_err(|e| save_failed(e.to_string()))?;
        file.sync_all().map_err(|e| save_failed(e.to_string()))?;
    }
    fs::rename(&temp, path).map_err(|e| save_failed(e.to_string()))?;

    // Make the rename itself durable where directories can be synced.
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
            tracing::debug!("Directory sync skipped for {}: {}", parent.display(), e);
        }
    }
    Ok(())
}

/// Remove the snapshot at `path` and any leftover temp file
///
/// Returns whether a snapshot existed.
pub fn delete_store(path: &Path) -> Result<bool> {
    let temp = temp_path(path);
    if temp.exists() {
        fs::remove_file(&temp).map_err(Error::Io)?;
    }
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("Deleted odometer store {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Io(e)),
    }
}
