//! Microgrid simulator entry point — CLI wiring and scenario-driven runs.

use std::path::Path;
use std::process;

use microgrid_sim::config::ScenarioConfig;
use microgrid_sim::io::export::export_csv;
use microgrid_sim::sim::clock::SimMode;
use microgrid_sim::sim::engine::MicrogridEngine;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    seed_override: Option<u64>,
    minutes: usize,
    mode: SimMode,
    live: bool,
    telemetry_out: Option<String>,
}

fn print_help() {
    eprintln!("microgrid-sim — residential microgrid simulator with community pooling");
    eprintln!();
    eprintln!("Usage: microgrid-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --minutes <n>            Simulated minutes to run (default: 1440)");
    eprintln!("  --mode <realtime|accelerated>");
    eprintln!("                           Clock mode for --live runs (default: accelerated)");
    eprintln!("  --live                   Drive the run from the virtual clock and");
    eprintln!("                           print each tick delta as a JSON line");
    eprintln!("  --telemetry-out <path>   Export tick history to CSV");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("Without --live the run is headless: ticks execute back-to-back as");
    eprintln!("fast as possible and the daily rollup is printed at the end.");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        seed_override: None,
        minutes: 1440,
        mode: SimMode::Accelerated,
        live: false,
        telemetry_out: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --scenario requires a path argument");
                    process::exit(1);
                }
                cli.scenario_path = Some(args[i].clone());
            }
            "--seed" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --seed requires a u64 argument");
                    process::exit(1);
                }
                if let Ok(s) = args[i].parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{}\" is not a valid u64", args[i]);
                    process::exit(1);
                }
            }
            "--minutes" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --minutes requires a positive integer argument");
                    process::exit(1);
                }
                match args[i].parse::<usize>() {
                    Ok(n) if n > 0 => cli.minutes = n,
                    _ => {
                        eprintln!(
                            "error: --minutes value \"{}\" is not a positive integer",
                            args[i]
                        );
                        process::exit(1);
                    }
                }
            }
            "--mode" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --mode requires realtime or accelerated");
                    process::exit(1);
                }
                cli.mode = match args[i].as_str() {
                    "realtime" => SimMode::Realtime,
                    "accelerated" => SimMode::Accelerated,
                    other => {
                        eprintln!("error: unknown mode \"{other}\"");
                        process::exit(1);
                    }
                };
            }
            "--live" => {
                cli.live = true;
            }
            "--telemetry-out" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --telemetry-out requires a path argument");
                    process::exit(1);
                }
                cli.telemetry_out = Some(args[i].clone());
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = parse_args();

    let mut scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::default()
    };

    if let Some(seed) = cli.seed_override {
        scenario.simulation.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let mut engine = MicrogridEngine::from_scenario(&scenario);

    if cli.live {
        let mut deltas = engine.subscribe();
        engine.start(cli.mode);
        for _ in 0..cli.minutes {
            match deltas.recv().await {
                Ok(delta) => match serde_json::to_string(&delta) {
                    Ok(line) => println!("{line}"),
                    Err(e) => eprintln!("error: failed to serialize delta: {e}"),
                },
                Err(e) => {
                    eprintln!("error: delta stream closed: {e}");
                    break;
                }
            }
        }
        engine.pause();
    } else {
        engine.run_for(cli.minutes);
    }

    if let Some(rollup) = engine.daily_rollup() {
        println!("\n{rollup}");
    }

    if let Some(ref path) = cli.telemetry_out {
        let history = engine.history_snapshot();
        if let Err(e) = export_csv(&history, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {path}");
    }
}
