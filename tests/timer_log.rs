// tests/timer_log.rs
mod common;
use crate::common::{init_tracing, read_lines};

use std::error::Error;
use std::time::Duration;

use startbench::command::{Command, ExecContext};
use startbench::errors::BenchError;
use startbench::timer::{Timer, TimerHandle, TimerId, TimerRecord};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn mark_after_known_sleep_reports_that_duration() -> TestResult {
    init_tracing();
    let mut timer = Timer::new("roundtrip");

    timer.start()?;
    std::thread::sleep(Duration::from_secs(1));
    let record = timer.mark()?;

    assert!(record.elapsed >= 1.0, "elapsed {} < 1s", record.elapsed);
    assert!(record.elapsed < 1.1, "elapsed {} too far above 1s", record.elapsed);
    assert_eq!(record.id, TimerId::Name("roundtrip".into()));

    Ok(())
}

#[test]
fn every_mark_appends_one_record_in_call_order() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("nested").join("dir").join("starlight.csv");
    let mut timer = Timer::with_output("starlight", &output);

    timer.start()?;
    for _ in 0..3 {
        std::thread::sleep(Duration::from_millis(20));
        timer.mark()?;
    }
    timer.stop()?;

    let lines = read_lines(&output)?;
    assert_eq!(lines.len(), 3);

    let records: Vec<TimerRecord> = lines
        .iter()
        .map(|l| l.parse())
        .collect::<Result<_, _>>()?;

    for pair in records.windows(2) {
        assert_eq!(pair[0].started_at, pair[1].started_at);
        assert!(pair[0].elapsed < pair[1].elapsed);
    }
    assert!(records.iter().all(|r| r.id.to_string() == "starlight"));

    Ok(())
}

#[test]
fn restarting_appends_to_the_existing_log() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("t.csv");
    let mut timer = Timer::with_output(7u32, &output);

    timer.start()?;
    timer.mark()?;
    timer.stop()?;

    timer.start()?;
    timer.mark()?;
    timer.stop()?;

    let lines = read_lines(&output)?;
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.starts_with("7,")));

    Ok(())
}

#[test]
fn mark_and_elapsed_before_start_fail_loudly() {
    let mut timer = Timer::new("early");

    match timer.mark() {
        Err(BenchError::TimerNotStarted(id)) => assert_eq!(id, "early"),
        other => panic!("expected TimerNotStarted, got {other:?}"),
    }
    assert!(matches!(timer.elapsed(), Err(BenchError::TimerNotStarted(_))));
}

#[test]
fn stop_without_sink_is_a_no_op() -> TestResult {
    let mut timer = Timer::new("no-sink");
    timer.stop()?;
    timer.start()?;
    timer.stop()?;
    timer.stop()?;
    Ok(())
}

#[test]
fn record_line_format_is_id_start_elapsed() -> TestResult {
    let record = TimerRecord {
        id: TimerId::Index(3),
        started_at: 1.5,
        elapsed: 0.25,
    };
    assert_eq!(record.to_string(), "3,1.500000,0.250000");

    let parsed: TimerRecord = "starlight,1718031234.512345,3.201877\n".parse()?;
    assert_eq!(parsed.id, TimerId::Name("starlight".into()));
    assert!((parsed.started_at - 1718031234.512345).abs() < 1e-6);
    assert!((parsed.elapsed - 3.201877).abs() < 1e-9);

    assert!("starlight,3.2".parse::<TimerRecord>().is_err());
    assert!("starlight,abc,3.2".parse::<TimerRecord>().is_err());

    Ok(())
}

#[test]
fn numeric_looking_names_stay_names_through_the_log() -> TestResult {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("bond.csv");
    let mut timer = Timer::with_output("007", &output);

    assert_eq!(timer.id(), &TimerId::Name("007".into()));

    timer.start()?;
    timer.mark()?;
    timer.stop()?;

    let lines = read_lines(&output)?;
    assert!(lines[0].starts_with("007,"), "line was {:?}", lines[0]);
    let record: TimerRecord = lines[0].parse()?;
    assert_eq!(record.id, TimerId::Name("007".into()));

    assert_eq!(TimerId::from(7u32), TimerId::Index(7));

    Ok(())
}

/// Start, mark and stop commands built from clones of one handle drive the
/// same timer.
#[tokio::test]
async fn commands_share_one_timer_through_its_handle() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("shared.csv");
    let handle = TimerHandle::new(Timer::with_output("shared", &output));

    let ctx = ExecContext::default();
    let steps = [
        Command::StartTimer(handle.clone()),
        Command::Sleep(Duration::from_millis(50)),
        Command::MarkTimer(handle.clone()),
        Command::StopTimer(handle.clone()),
    ];
    for step in &steps {
        step.execute(&ctx).await?;
    }

    assert!(handle.is_started());
    assert!(handle.elapsed()? >= Duration::from_millis(50));

    let lines = read_lines(&output)?;
    assert_eq!(lines.len(), 1);
    let record: TimerRecord = lines[0].parse()?;
    assert!(record.elapsed >= 0.05);

    Ok(())
}
