//! Two-state motion sampler
//!
//! While idle, travel is the difference between consecutive carriage
//! position samples. While printing, travel comes from parsing the G-code
//! stream. Pending travel is flushed to the store before every mode or
//! homing transition so each movement lands in exactly one mode.

use motionminder_core::{
    Axis, AxisMap, AxisSet, MotionEvent, MotionSample, Position, Result, SampleSource,
    TrackingMode,
};
use motionminder_gcode::MotionParser;
use motionminder_store::OdometerStore;
use std::sync::Arc;

/// Mode-switching distance accumulator feeding an [`OdometerStore`]
#[derive(Debug)]
pub struct MotionSampler {
    store: Arc<OdometerStore>,
    mode: TrackingMode,
    homed: AxisSet,
    homed_axes_only: bool,
    homing: bool,
    /// Idle baseline per axis; `None` until the next sample establishes it
    baseline: AxisMap<Option<f64>>,
    last_seen: Option<Position>,
    parser: MotionParser,
    pending: AxisMap<f64>,
    pending_samples: u32,
    update_interval: u32,
}

impl MotionSampler {
    /// Create an idle sampler that flushes every `update_interval` samples
    pub fn new(store: Arc<OdometerStore>, update_interval: u32, homed_axes_only: bool) -> Self {
        Self {
            store,
            mode: TrackingMode::Idle,
            homed: AxisSet::empty(),
            homed_axes_only,
            homing: false,
            baseline: AxisMap::default(),
            last_seen: None,
            parser: MotionParser::new(),
            pending: AxisMap::splat(0.0),
            pending_samples: 0,
            update_interval: update_interval.max(1),
        }
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn homed_axes(&self) -> AxisSet {
        self.homed
    }

    pub fn is_homing(&self) -> bool {
        self.homing
    }

    /// Travel not yet handed to the store
    pub fn pending(&self) -> AxisMap<f64> {
        self.pending
    }

    /// Apply one host event
    ///
    /// Errors only come from flushing to the store; the sampler state is
    /// consistent either way.
    pub fn handle_event(&mut self, event: &MotionEvent) -> Result<()> {
        match event {
            MotionEvent::PositionSample { position } => self.on_position(position),
            MotionEvent::GcodeLine { line } => self.on_gcode(line),
            MotionEvent::PrintStarted => self.on_print_started(),
            MotionEvent::PrintFinished { toolhead } | MotionEvent::PrintCancelled { toolhead } => {
                self.on_print_ended(*toolhead)
            }
            MotionEvent::HomingStarted => {
                let result = self.flush();
                self.homing = true;
                result
            }
            MotionEvent::HomingFinished => {
                let result = self.flush();
                self.homing = false;
                // Pre-homing coordinates no longer describe the carriage.
                self.baseline = AxisMap::default();
                self.last_seen = None;
                result
            }
            MotionEvent::HomedAxesChanged { axes } => {
                self.homed = *axes;
                for axis in Axis::ALL {
                    if !self.counts(axis) {
                        self.baseline[axis] = None;
                    }
                }
                Ok(())
            }
        }
    }

    /// Hand pending travel to the store
    ///
    /// The window is cleared even when the write fails. The store keeps the
    /// travel in memory and retries on its next write, so re-adding it here
    /// would double count.
    pub fn flush(&mut self) -> Result<()> {
        let pending = std::mem::replace(&mut self.pending, AxisMap::splat(0.0));
        self.pending_samples = 0;
        if pending.is_zero() {
            return Ok(());
        }
        tracing::debug!(
            "Flushing X={:.3} Y={:.3} Z={:.3} mm ({})",
            pending.x,
            pending.y,
            pending.z,
            self.mode
        );
        self.store.add_distances(&pending)
    }

    fn counts(&self, axis: Axis) -> bool {
        !self.homed_axes_only || self.homed.contains(axis)
    }

    fn on_position(&mut self, position: &Position) -> Result<()> {
        if self.mode == TrackingMode::Printing {
            tracing::trace!("Dropping position sample received while printing");
            return Ok(());
        }
        if self.homing {
            return Ok(());
        }

        self.last_seen = Some(*position);
        let mut contributed = false;
        for axis in Axis::ALL {
            if !self.counts(axis) {
                self.baseline[axis] = None;
                continue;
            }
            let current = position[axis];
            if let Some(previous) = self.baseline[axis] {
                let sample =
                    MotionSample::new(axis, current - previous, SampleSource::LivePosition);
                contributed |= self.accumulate(sample);
            }
            self.baseline[axis] = Some(current);
        }

        if contributed {
            self.record_sample()
        } else {
            Ok(())
        }
    }

    fn on_gcode(&mut self, line: &str) -> Result<()> {
        if self.mode == TrackingMode::Idle {
            tracing::trace!("Ignoring G-code line outside of a print: {}", line.trim());
            return Ok(());
        }
        match self.parser.parse_line(line) {
            Ok(Some(delta)) => {
                let mut contributed = false;
                for sample in delta.samples() {
                    contributed |= self.accumulate(sample);
                }
                if contributed {
                    self.record_sample()
                } else {
                    Ok(())
                }
            }
            Ok(None) => Ok(()),
            Err(e) => {
                tracing::warn!("Skipping G-code line '{}': {}", line.trim(), e);
                Ok(())
            }
        }
    }

    fn on_print_started(&mut self) -> Result<()> {
        if self.mode == TrackingMode::Printing {
            tracing::debug!("Print start received while already printing");
            return Ok(());
        }
        let result = self.flush();
        let start = self.last_seen.unwrap_or_default();
        self.parser = MotionParser::starting_at(start);
        self.baseline = AxisMap::default();
        self.mode = TrackingMode::Printing;
        tracing::info!("Tracking mode: printing");
        result
    }

    fn on_print_ended(&mut self, toolhead: Option<Position>) -> Result<()> {
        if self.mode == TrackingMode::Idle {
            tracing::debug!("Print end received while idle");
            return Ok(());
        }
        let result = self.flush();
        let resume = toolhead.unwrap_or_else(|| self.parser.position());
        self.last_seen = Some(resume);
        for axis in Axis::ALL {
            self.baseline[axis] = self.counts(axis).then_some(resume[axis]);
        }
        self.mode = TrackingMode::Idle;
        tracing::info!("Tracking mode: idle");
        result
    }

    /// Add one sample to the window if it belongs to the current mode
    fn accumulate(&mut self, sample: MotionSample) -> bool {
        let expected = match self.mode {
            TrackingMode::Idle => SampleSource::LivePosition,
            TrackingMode::Printing => SampleSource::GcodeCommand,
        };
        if sample.source != expected {
            tracing::trace!("Dropping {:?} sample while {}", sample.source, self.mode);
            return false;
        }
        if sample.delta_mm == 0.0 {
            return false;
        }
        self.pending[sample.axis] += sample.delta_mm.abs();
        true
    }

    fn record_sample(&mut self) -> Result<()> {
        self.pending_samples += 1;
        if self.pending_samples >= self.update_interval {
            self.flush()
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sampler(interval: u32, homed_only: bool) -> (TempDir, Arc<OdometerStore>, MotionSampler) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(OdometerStore::open(dir.path().join("odometer.json")).unwrap());
        let sampler = MotionSampler::new(store.clone(), interval, homed_only);
        (dir, store, sampler)
    }

    fn sample(x: f64, y: f64, z: f64) -> MotionEvent {
        MotionEvent::PositionSample {
            position: Position::new(x, y, z),
        }
    }

    fn gcode(line: &str) -> MotionEvent {
        MotionEvent::GcodeLine {
            line: line.to_string(),
        }
    }

    fn totals(store: &OdometerStore) -> AxisMap<f64> {
        store.snapshot().map(|_, r| r.total_distance_mm)
    }

    #[test]
    fn test_idle_samples_accumulate_magnitude() {
        let (_dir, store, mut sampler) = sampler(1, false);
        sampler.handle_event(&sample(0.0, 0.0, 0.0)).unwrap();
        sampler.handle_event(&sample(10.0, 5.0, 0.0)).unwrap();
        sampler.handle_event(&sample(4.0, 5.0, 1.0)).unwrap();
        assert_eq!(totals(&store), AxisMap::new(16.0, 5.0, 1.0));
    }

    #[test]
    fn test_mode_switch_counts_each_movement_once() {
        let (_dir, store, mut sampler) = sampler(20, false);
        sampler.handle_event(&sample(0.0, 0.0, 0.0)).unwrap();
        sampler.handle_event(&sample(10.0, 0.0, 0.0)).unwrap();
        sampler.handle_event(&MotionEvent::PrintStarted).unwrap();
        assert_eq!(store.get(Axis::X).total_distance_mm, 10.0);

        // Stale sample for a move already seen by the parser
        sampler.handle_event(&sample(15.0, 0.0, 0.0)).unwrap();
        sampler.handle_event(&gcode("G1 X20")).unwrap();
        sampler
            .handle_event(&MotionEvent::PrintFinished {
                toolhead: Some(Position::new(20.0, 0.0, 0.0)),
            })
            .unwrap();
        sampler.handle_event(&sample(20.0, 0.0, 0.0)).unwrap();
        sampler.flush().unwrap();

        assert_eq!(totals(&store), AxisMap::new(20.0, 0.0, 0.0));
        assert_eq!(sampler.mode(), TrackingMode::Idle);
    }

    #[test]
    fn test_window_flushes_at_interval() {
        let (_dir, store, mut sampler) = sampler(3, false);
        sampler.handle_event(&sample(0.0, 0.0, 0.0)).unwrap();
        sampler.handle_event(&sample(1.0, 0.0, 0.0)).unwrap();
        sampler.handle_event(&sample(2.0, 0.0, 0.0)).unwrap();
        assert_eq!(store.get(Axis::X).total_distance_mm, 0.0);
        assert_eq!(sampler.pending().x, 2.0);

        sampler.handle_event(&sample(3.0, 0.0, 0.0)).unwrap();
        assert_eq!(store.get(Axis::X).total_distance_mm, 3.0);
        assert!(sampler.pending().is_zero());
    }

    #[test]
    fn test_unhomed_axes_are_ignored() {
        let (_dir, store, mut sampler) = sampler(1, true);
        sampler.handle_event(&sample(0.0, 0.0, 0.0)).unwrap();
        sampler.handle_event(&sample(5.0, 5.0, 5.0)).unwrap();
        assert!(totals(&store).is_zero());

        sampler
            .handle_event(&MotionEvent::HomedAxesChanged {
                axes: "xy".parse().unwrap(),
            })
            .unwrap();
        sampler.handle_event(&sample(5.0, 5.0, 5.0)).unwrap();
        sampler.handle_event(&sample(8.0, 9.0, 9.0)).unwrap();
        assert_eq!(totals(&store), AxisMap::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn test_homing_travel_is_not_counted() {
        let (_dir, store, mut sampler) = sampler(1, false);
        sampler.handle_event(&sample(100.0, 100.0, 10.0)).unwrap();
        sampler.handle_event(&MotionEvent::HomingStarted).unwrap();
        sampler.handle_event(&sample(50.0, 50.0, 5.0)).unwrap();
        sampler.handle_event(&MotionEvent::HomingFinished).unwrap();
        sampler.handle_event(&sample(0.0, 0.0, 0.0)).unwrap();
        sampler.handle_event(&sample(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(totals(&store), AxisMap::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_print_after_homing_starts_from_origin() {
        let (_dir, store, mut sampler) = sampler(1, false);
        sampler.handle_event(&sample(100.0, 0.0, 0.0)).unwrap();
        sampler.handle_event(&MotionEvent::HomingStarted).unwrap();
        sampler.handle_event(&MotionEvent::HomingFinished).unwrap();
        sampler.handle_event(&MotionEvent::PrintStarted).unwrap();
        sampler.handle_event(&gcode("G1 X10")).unwrap();
        assert_eq!(totals(&store), AxisMap::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn test_samples_from_the_other_feed_are_dropped() {
        let (_dir, _store, mut sampler) = sampler(20, false);
        assert!(!sampler.accumulate(MotionSample::new(Axis::X, 5.0, SampleSource::GcodeCommand)));
        assert!(sampler.accumulate(MotionSample::new(Axis::X, -5.0, SampleSource::LivePosition)));
        assert!(!sampler.accumulate(MotionSample::new(Axis::Y, 0.0, SampleSource::LivePosition)));
        assert_eq!(sampler.pending(), AxisMap::new(5.0, 0.0, 0.0));

        sampler.handle_event(&MotionEvent::PrintStarted).unwrap();
        assert!(!sampler.accumulate(MotionSample::new(Axis::Z, 1.0, SampleSource::LivePosition)));
        sampler.handle_event(&gcode("G1 Z2")).unwrap();
        assert_eq!(sampler.pending(), AxisMap::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_printing_ignores_bad_lines_and_opaque_commands() {
        let (_dir, store, mut sampler) = sampler(1, false);
        sampler.handle_event(&MotionEvent::PrintStarted).unwrap();
        for line in ["G28", "BED_MESH_CALIBRATE", "G1 X10 Y10", "G1 Xbad", "G1 X0"] {
            sampler.handle_event(&gcode(line)).unwrap();
        }
        assert_eq!(totals(&store), AxisMap::new(20.0, 10.0, 0.0));
    }

    #[test]
    fn test_cancel_without_toolhead_resumes_from_parser() {
        let (_dir, store, mut sampler) = sampler(1, false);
        sampler.handle_event(&MotionEvent::PrintStarted).unwrap();
        sampler.handle_event(&gcode("G1 X30")).unwrap();
        sampler
            .handle_event(&MotionEvent::PrintCancelled { toolhead: None })
            .unwrap();
        sampler.handle_event(&sample(35.0, 0.0, 0.0)).unwrap();
        assert_eq!(store.get(Axis::X).total_distance_mm, 35.0);
    }

    #[test]
    fn test_gcode_while_idle_is_ignored() {
        let (_dir, store, mut sampler) = sampler(1, false);
        sampler.handle_event(&gcode("G1 X10")).unwrap();
        assert!(totals(&store).is_zero());
    }
}
