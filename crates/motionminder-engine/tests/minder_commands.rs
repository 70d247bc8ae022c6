use motionminder_core::{Axis, CommandError, Error, GcodeError, MergePolicy};
use motionminder_engine::MotionMinder;
use motionminder_gcode::{HistoryEntry, HistoryJob};
use motionminder_settings::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.path = dir.join("odometer.json");
    config.tracking.update_interval = 1;
    config.tracking.homed_axes_only = false;
    config
}

fn minder(dir: &TempDir) -> MotionMinder {
    MotionMinder::new(config(dir.path())).unwrap()
}

#[tokio::test]
async fn test_set_odometer_then_stats() {
    let dir = TempDir::new().unwrap();
    let minder = minder(&dir);

    minder
        .execute_line("MOTION_MINDER SET_ODOMETER=100 AXES=xy UNIT=mm")
        .await
        .unwrap();
    let stats = minder.execute_line("MOTION_MINDER STATS=TRUE").await.unwrap();

    assert!(stats.contains("X: 100.000 mm"), "{stats}");
    assert!(stats.contains("Y: 100.000 mm"), "{stats}");
    assert!(stats.contains("Z: 0.000 mm"), "{stats}");
    assert_eq!(minder.store().get(Axis::X).total_distance_mm, 100.0);
}

#[tokio::test]
async fn test_relative_maintenance_is_absolute_target() {
    let dir = TempDir::new().unwrap();
    let minder = minder(&dir);

    minder.execute_line("SET_ODOMETER=20 AXES=z UNIT=km").await.unwrap();
    minder
        .execute_line("SET_MAINTENANCE=50 AXES=z UNIT=km RELATIVE=True")
        .await
        .unwrap();

    let z = minder.store().get(Axis::Z);
    assert_eq!(z.maintenance_threshold_mm, Some(70_000_000.0));
    assert!(!minder.store().is_maintenance_due(Axis::Z));

    let stats = minder.execute_line("STATS=TRUE AXES=z").await.unwrap();
    assert!(stats.contains("Next maintenance in: 50.000 km"), "{stats}");
    assert!(stats.contains("health 100.00%"), "{stats}");
}

#[tokio::test]
async fn test_rejected_commands_change_nothing() {
    let dir = TempDir::new().unwrap();
    let minder = minder(&dir);
    minder.execute_line("SET_ODOMETER=5 UNIT=mm").await.unwrap();
    let before = minder.store().snapshot();

    for line in [
        "SET_ODOMETER=abc",
        "SET_ODOMETER=1 AXES=w",
        "SET_ODOMETER=1 UNIT=miles",
        "SET_MAINTENANCE=1 BOGUS=1",
    ] {
        let err = minder.execute_line(line).await.unwrap_err();
        assert!(err.is_command_error(), "{line}: {err}");
    }

    let err = minder
        .execute_line("SET_ODOMETER=-10 UNIT=mm RELATIVE=TRUE AXES=xy")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Command(CommandError::InvalidValue { .. })
    ));
    assert_eq!(minder.store().snapshot(), before);
}

#[tokio::test]
async fn test_process_history_without_directory() {
    let dir = TempDir::new().unwrap();
    let minder = minder(&dir);
    let err = minder.execute_line("PROCESS_HISTORY=TRUE").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Command(CommandError::InvalidArgument { .. })
    ));
}

#[tokio::test]
async fn test_process_history_merges_successful_files() {
    let dir = TempDir::new().unwrap();
    let gcodes = dir.path().join("gcodes");
    std::fs::create_dir(&gcodes).unwrap();
    std::fs::write(gcodes.join("a.gcode"), "G1 X10\nG1 X0\n").unwrap();
    std::fs::write(gcodes.join("b.gcode"), "G1 Y5\nG1 Y?\n").unwrap();
    std::fs::write(gcodes.join("c.gcode"), "G91\nG1 Z2\n").unwrap();

    let mut config = config(dir.path());
    config.history.gcode_directory = Some(gcodes);
    let minder = MotionMinder::new(config).unwrap();
    minder.execute_line("SET_ODOMETER=1 UNIT=mm AXES=x").await.unwrap();

    let response = minder.execute_line("PROCESS_HISTORY=TRUE").await.unwrap();
    assert!(response.contains("2 file(s) succeeded, 1 failed"), "{response}");
    assert!(response.contains("Merged into odometer (add)"), "{response}");

    let totals = minder.store().snapshot();
    assert_eq!(totals.x.total_distance_mm, 21.0);
    assert_eq!(totals.y.total_distance_mm, 0.0);
    assert_eq!(totals.z.total_distance_mm, 2.0);

    minder
        .execute_line("PROCESS_HISTORY=TRUE MERGE=REPLACE")
        .await
        .unwrap();
    assert_eq!(minder.store().get(Axis::X).total_distance_mm, 20.0);
}

#[tokio::test]
async fn test_history_summary_is_not_merged_until_asked() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("job.gcode");
    std::fs::write(&file, "G1 X3\n").unwrap();
    let minder = minder(&dir);

    let job = HistoryJob::new(vec![HistoryEntry::new(&file)]);
    let summary = minder.process_history(&job).await.unwrap();
    assert_eq!(minder.store().get(Axis::X).total_distance_mm, 0.0);

    assert!(minder.merge_history(&summary, MergePolicy::Add).unwrap());
    assert_eq!(minder.store().get(Axis::X).total_distance_mm, 3.0);
    assert!(!minder.cancel_history());
}

#[tokio::test]
async fn test_values_survive_restart() {
    let dir = TempDir::new().unwrap();
    {
        let minder = minder(&dir);
        minder.execute_line("SET_ODOMETER=1.5 AXES=y").await.unwrap();
        minder.shutdown().unwrap();
    }
    let minder = minder(&dir);
    assert_eq!(minder.store().get(Axis::Y).total_distance_mm, 1_500_000.0);
}

/// A G-code file long enough that measuring it spans many scheduler ticks
fn long_gcode(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "G1 X10 Y10\nG1 X0 Y0\n".repeat(100_000)).unwrap();
    path
}

#[tokio::test]
async fn test_dropped_history_run_releases_slot() {
    let dir = TempDir::new().unwrap();
    let long = long_gcode(dir.path(), "long.gcode");
    let short = dir.path().join("short.gcode");
    std::fs::write(&short, "G1 Z4\n").unwrap();
    let minder = minder(&dir);

    let job = HistoryJob::new(vec![HistoryEntry::new(&long)]);
    let abandoned = tokio::time::timeout(Duration::ZERO, minder.process_history(&job)).await;
    assert!(abandoned.is_err());
    assert!(!minder.cancel_history());

    let job = HistoryJob::new(vec![HistoryEntry::new(&short)]);
    let summary = minder.process_history(&job).await.unwrap();
    assert_eq!(summary.total.z, 4.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_mid_batch_leaves_odometer() {
    let dir = TempDir::new().unwrap();
    let gcodes = dir.path().join("gcodes");
    std::fs::create_dir(&gcodes).unwrap();
    for name in ["a.gcode", "b.gcode", "c.gcode"] {
        long_gcode(&gcodes, name);
    }

    let mut config = config(dir.path());
    config.history.gcode_directory = Some(gcodes);
    let minder = Arc::new(MotionMinder::new(config).unwrap());
    minder.execute_line("SET_ODOMETER=7 UNIT=mm").await.unwrap();
    let before = minder.store().snapshot();

    let running = {
        let minder = Arc::clone(&minder);
        tokio::spawn(async move { minder.execute_line("PROCESS_HISTORY=TRUE").await })
    };
    while !minder.cancel_history() {
        assert!(!running.is_finished(), "history finished before it could be cancelled");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let err = running.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());
    assert!(matches!(
        err,
        Error::Gcode(GcodeError::Cancelled { total: 3, completed }) if completed < 3
    ));
    assert_eq!(minder.store().snapshot(), before);
    assert!(!minder.cancel_history());
}

#[tokio::test]
async fn test_process_history_from_job_list() {
    let dir = TempDir::new().unwrap();
    let gcodes = dir.path().join("gcodes");
    std::fs::create_dir(&gcodes).unwrap();
    std::fs::write(gcodes.join("done.gcode"), "G1 X10\n").unwrap();
    std::fs::write(gcodes.join("stray.gcode"), "G1 X500\n").unwrap();
    std::fs::write(
        gcodes.join("stopped.gcode"),
        "M83\nG1 Y5 E2\nG1 Y50 E2\n",
    )
    .unwrap();
    let list = dir.path().join("history.json");
    std::fs::write(
        &list,
        r#"{"result": {"count": 2, "jobs": [
            {"filename": "done.gcode", "status": "complete", "filament_used": 1.0, "exists": true},
            {"filename": "stopped.gcode", "status": "cancelled", "filament_used": 1.0, "exists": true}
        ]}}"#,
    )
    .unwrap();

    let mut config = config(dir.path());
    config.history.gcode_directory = Some(gcodes);
    config.history.job_list = Some(list);
    let minder = MotionMinder::new(config).unwrap();

    let response = minder.execute_line("PROCESS_HISTORY=TRUE").await.unwrap();
    assert!(response.contains("2 file(s) succeeded, 0 failed"), "{response}");
    let totals = minder.store().snapshot();
    assert_eq!(totals.x.total_distance_mm, 10.0);
    assert_eq!(totals.y.total_distance_mm, 5.0);
}
