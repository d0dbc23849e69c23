// src/lib.rs

pub mod cli;
pub mod command;
pub mod config;
pub mod errors;
pub mod logging;
pub mod service;
pub mod timer;

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::command::Command;
use crate::config::{build_service, build_timers, load_and_validate};
use crate::service::{Service, ServiceOutcome};
use crate::timer::TimerHandle;

/// Exit code reported when the run is interrupted with Ctrl-C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and validation
/// - timer and service construction
/// - the round loop
/// - Ctrl-C handling
///
/// Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let plan = load_and_validate(&args.plan)?;
    let name = plan.resolve_service_name(args.service.as_deref())?.to_string();

    let timers = build_timers(&plan, args.output_dir.as_deref());
    let service = build_service(&plan, &name, &timers)?;

    if args.dry_run {
        print_dry_run(&service, &timers, args.rounds);
        return Ok(0);
    }

    // Ctrl-C drops the running step; its child is killed on drop.
    let code = tokio::select! {
        outcome = run_rounds(&service, args.rounds) => outcome?.exit_code(),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            warn!(service = %service.name(), "interrupted; stopping");
            INTERRUPTED_EXIT_CODE
        }
    };

    // Flush timer logs even if the plan failed before its stop_timer step.
    for timer in timers.values() {
        timer.stop()?;
    }

    Ok(code)
}

/// Run `service` up to `rounds` times, stopping at the first round that does
/// not succeed.
pub async fn run_rounds(service: &Service, rounds: u32) -> errors::Result<ServiceOutcome> {
    let mut outcome = ServiceOutcome::Success;

    for round in 1..=rounds {
        info!(service = %service.name(), round, rounds, "starting round");
        outcome = service.run().await?;

        if !outcome.is_success() {
            warn!(
                service = %service.name(),
                round,
                exit_code = outcome.exit_code(),
                "round did not succeed; skipping remaining rounds"
            );
            break;
        }
    }

    Ok(outcome)
}

/// Simple dry-run output: print timers and the resolved steps.
fn print_dry_run(service: &Service, timers: &BTreeMap<String, TimerHandle>, rounds: u32) {
    println!("startbench dry-run");
    println!("  service = {}", service.name());
    println!("  rounds = {rounds}");
    println!();

    println!("timers ({}):", timers.len());
    for (name, timer) in timers.iter() {
        match timer.output() {
            Some(path) => println!("  - {name} -> {}", path.display()),
            None => println!("  - {name}"),
        }
    }
    println!();

    println!("steps ({}):", service.commands().len());
    for (idx, command) in service.commands().iter().enumerate() {
        print_command(command, &format!("{idx}."), 2);
    }

    debug!("dry-run complete (no execution)");
}

fn print_command(command: &Command, label: &str, indent: usize) {
    println!("{:indent$}{label} {command}", "");
    if let Command::Shell(shell) = command {
        if let Some(readiness) = shell.readiness() {
            if let Some(timeout) = readiness.timeout() {
                println!("{:indent$}   ready_timeout: {:?}", "", timeout, indent = indent);
            }
            for cleanup in readiness.cleanup() {
                print_command(cleanup, "cleanup:", indent + 3);
            }
        }
    }
}
