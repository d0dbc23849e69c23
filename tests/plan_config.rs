// tests/plan_config.rs
mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;

use startbench::command::Command;
use startbench::config::{
    build_service, build_timers, load_and_validate, parse_duration, PlanFile, RawPlanFile,
};
use startbench::errors::BenchError;
use startbench_test_utils::builders::{PlanBuilder, StepBuilder};

type TestResult = Result<(), Box<dyn Error>>;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

fn config_error(raw: RawPlanFile) -> String {
    match PlanFile::try_from(raw) {
        Err(BenchError::ConfigError(msg)) => msg,
        Err(e) => panic!("expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("expected ConfigError, got Ok"),
    }
}

#[test]
fn starlight_demo_builds_the_expected_sequence() -> TestResult {
    init_tracing();
    let plan = load_and_validate(demo("redis-starlight.toml"))?;

    assert_eq!(plan.service_names(), vec!["redis"]);
    assert_eq!(plan.resolve_service_name(None)?, "redis");
    assert_eq!(plan.defaults.ready_timeout.as_deref(), Some("120s"));

    let redis = &plan.service["redis"];
    assert_eq!(redis.mounts, vec![PathBuf::from("/tmp/test-redis-data")]);
    assert_eq!(redis.steps.len(), 7);

    let timers = build_timers(&plan, Some(Path::new("/data/results")));
    assert_eq!(
        timers["starlight"].output(),
        Some(PathBuf::from("/data/results/starlight.csv"))
    );

    let service = build_service(&plan, "redis", &timers)?;
    let commands = service.commands();
    assert_eq!(commands.len(), 8, "mount setup is prepended");
    assert!(matches!(commands[0], Command::EnsureDirs(_)));
    assert!(matches!(commands[1], Command::StartTimer(_)));
    assert!(matches!(commands[7], Command::StopTimer(_)));

    let Command::Shell(start) = &commands[4] else {
        panic!("step 4 should be the task start shell command");
    };
    assert_eq!(start.cmd(), "sudo ctr task start instance");
    let readiness = start.readiness().expect("task start waits for readiness");
    assert_eq!(readiness.wait_for(), "Ready to accept connections");
    assert_eq!(readiness.timeout(), Some(Duration::from_secs(120)));
    assert_eq!(readiness.cleanup().len(), 2);
    assert!(matches!(readiness.cleanup()[0], Command::MarkTimer(_)));

    Ok(())
}

#[test]
fn containerd_demo_accepts_print_timer_alias_and_step_timeout() -> TestResult {
    init_tracing();
    let plan = load_and_validate(demo("redis-containerd.toml"))?;
    let timers = build_timers(&plan, None);
    let service = build_service(&plan, "redis", &timers)?;

    assert_eq!(
        timers["containerd"].output(),
        Some(PathBuf::from("containerd.csv"))
    );

    let Command::Shell(run) = &service.commands()[2] else {
        panic!("step 2 should be nerdctl run");
    };
    let readiness = run.readiness().expect("nerdctl run waits for readiness");
    assert_eq!(readiness.timeout(), Some(Duration::from_secs(300)));
    assert!(matches!(readiness.cleanup()[0], Command::MarkTimer(_)));

    Ok(())
}

#[tokio::test]
async fn local_smoke_demo_runs_end_to_end() -> TestResult {
    init_tracing();
    let plan = load_and_validate(demo("local-smoke.toml"))?;
    let timers = build_timers(&plan, None);
    let service = build_service(&plan, "smoke", &timers)?;

    let outcome = service.run().await?;

    assert!(outcome.is_success());
    let elapsed = timers["smoke"].elapsed()?;
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(10));

    Ok(())
}

#[test]
fn wait_for_without_cleanup_is_rejected() {
    let raw = PlanBuilder::new()
        .with_service("s", vec![StepBuilder::run("server").wait_for("ready").build()])
        .raw();
    assert!(config_error(raw).contains("wait_for requires a cleanup list"));
}

#[test]
fn cleanup_without_wait_for_is_rejected() {
    let raw = PlanBuilder::new()
        .with_service(
            "s",
            vec![StepBuilder::run("server")
                .cleanup(vec![StepBuilder::run("kill").build()])
                .build()],
        )
        .raw();
    assert!(config_error(raw).contains("cleanup requires wait_for"));
}

#[test]
fn empty_wait_for_is_rejected() {
    let raw = PlanBuilder::new()
        .with_service(
            "s",
            vec![StepBuilder::run("server").wait_for("").cleanup(vec![]).build()],
        )
        .raw();
    assert!(config_error(raw).contains("wait_for must not be empty"));
}

#[test]
fn unknown_timer_reference_is_rejected_even_inside_cleanup() {
    let raw = PlanBuilder::new()
        .with_timer("declared")
        .with_service(
            "s",
            vec![StepBuilder::run("server")
                .wait_for("ready")
                .cleanup(vec![StepBuilder::mark_timer("typo").build()])
                .build()],
        )
        .raw();
    let msg = config_error(raw);
    assert!(msg.contains("unknown timer 'typo'"));
    assert!(msg.contains("cleanup step 0"));
}

#[test]
fn signal_outside_cleanup_is_rejected() {
    let raw = PlanBuilder::new()
        .with_service("s", vec![StepBuilder::signal("TERM").build()])
        .raw();
    assert!(config_error(raw).contains("only allowed inside a cleanup list"));
}

#[test]
fn unknown_signal_and_bad_durations_are_rejected() {
    let raw = PlanBuilder::new()
        .with_service(
            "s",
            vec![StepBuilder::run("server")
                .wait_for("ready")
                .cleanup(vec![StepBuilder::signal("NOPE").build()])
                .build()],
        )
        .raw();
    assert!(config_error(raw).contains("unknown signal name"));

    let raw = PlanBuilder::new()
        .with_service("s", vec![StepBuilder::sleep("5 parsecs").build()])
        .raw();
    assert!(config_error(raw).contains("sleep"));

    let raw = PlanBuilder::new()
        .with_default_ready_timeout("soon")
        .with_service("s", vec![StepBuilder::run("true").build()])
        .raw();
    assert!(config_error(raw).contains("[defaults].ready_timeout"));
}

#[test]
fn ready_timeout_requires_wait_for() {
    let raw = PlanBuilder::new()
        .with_service("s", vec![StepBuilder::run("true").ready_timeout("1s").build()])
        .raw();
    assert!(config_error(raw).contains("ready_timeout requires wait_for"));
}

#[test]
fn step_with_two_actions_is_rejected() {
    let mut step = StepBuilder::run("true").build();
    step.sleep = Some("1s".into());

    let raw = PlanBuilder::new().with_service("s", vec![step]).raw();
    assert!(config_error(raw).contains("exactly one of"));
}

#[test]
fn plan_without_services_or_with_bad_timer_names_is_rejected() {
    assert!(config_error(PlanBuilder::new().raw()).contains("at least one [service.<name>]"));

    let raw = PlanBuilder::new()
        .with_timer("a,b")
        .with_service("s", vec![StepBuilder::run("true").build()])
        .raw();
    assert!(config_error(raw).contains("no commas"));
}

#[test]
fn unknown_step_keys_fail_to_parse() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
[service.s]
steps = [{{ run = "true", wiat_for = "ready" }}]
"#
    )?;

    match load_and_validate(file.path()) {
        Err(BenchError::TomlError(e)) => assert!(e.to_string().contains("wiat_for")),
        Err(e) => panic!("expected TomlError, got: {e:?}"),
        Ok(_) => panic!("expected error, got Ok"),
    }

    Ok(())
}

#[test]
fn service_selection() {
    let plan = PlanBuilder::new()
        .with_service("a", vec![StepBuilder::run("true").build()])
        .with_service("b", vec![StepBuilder::run("true").build()])
        .build();

    assert!(matches!(plan.resolve_service_name(Some("b")), Ok("b")));
    assert!(matches!(
        plan.resolve_service_name(None),
        Err(BenchError::ServiceNotFound(_))
    ));
    match plan.resolve_service_name(Some("c")) {
        Err(BenchError::ServiceNotFound(msg)) => assert!(msg.contains("available: a, b")),
        other => panic!("expected ServiceNotFound, got {other:?}"),
    }
}

#[test]
fn default_ready_timeout_applies_only_where_not_overridden() -> TestResult {
    let plan = PlanBuilder::new()
        .with_default_ready_timeout("30s")
        .with_service(
            "s",
            vec![
                StepBuilder::run("a").wait_for("x").cleanup(vec![]).build(),
                StepBuilder::run("b")
                    .wait_for("y")
                    .cleanup(vec![])
                    .ready_timeout("250ms")
                    .build(),
                StepBuilder::run("c").build(),
            ],
        )
        .build();

    let service = build_service(&plan, "s", &build_timers(&plan, None))?;
    let timeouts: Vec<Option<Duration>> = service
        .commands()
        .iter()
        .map(|c| match c {
            Command::Shell(s) => s.readiness().and_then(|r| r.timeout()),
            _ => None,
        })
        .collect();

    assert_eq!(
        timeouts,
        vec![
            Some(Duration::from_secs(30)),
            Some(Duration::from_millis(250)),
            None
        ]
    );

    Ok(())
}

#[test]
fn duration_strings() {
    assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
    assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
    assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
    assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("3d").is_err());
}

#[test]
fn oversized_durations_are_rejected_instead_of_overflowing() {
    assert!(parse_duration("400000000000000000m")
        .unwrap_err()
        .contains("too large"));
    assert!(parse_duration("10000000000000000h").is_err());
    assert!(parse_duration("1e400s").is_err());

    let raw = PlanBuilder::new()
        .with_service("s", vec![StepBuilder::sleep("400000000000000000m").build()])
        .raw();
    assert!(config_error(raw).contains("too large"));
}
