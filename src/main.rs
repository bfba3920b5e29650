use anyhow::Context;
use clap::{Parser, Subcommand};
use extrudekit::{
    calibration_config, candidate_ports, connection_manager, init_logging, list_ports,
    printer_inventory, CalibrationRunner, CalibrationWorkflow, CancelToken, Clock,
    CollectionPolicy, Command, Config, ConsoleSink, Measurement, MessageLog, SharedSession,
    SharedSink, SystemClock, SystemPortEnumerator, TemperatureMonitor, TemperatureReport,
    BUILD_DATE, VERSION,
};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Serial G-code control and extruder calibration for Marlin-style printers
#[derive(Debug, Parser)]
#[command(name = "extrudekit", version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Port to try; repeat to try several in order
    #[arg(short, long = "port", global = true)]
    ports: Vec<String>,

    /// Print results and logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Send G28 right after connecting
    #[arg(long, global = true)]
    auto_home: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List candidate serial ports
    Ports,
    /// Print firmware info, settings, position and endstops
    Info,
    /// Read the hotend temperature
    Temp {
        /// Keep polling until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Send one G-code line and print the reply
    Send {
        /// Command text, e.g. "M115"
        gcode: String,
    },
    /// Heat if needed and extrude `initial - remaining` mm
    Extrude {
        /// Filament length before extruding (mm)
        #[arg(long)]
        initial: f64,
        /// Filament length to leave behind (mm)
        #[arg(long)]
        remaining: f64,
    },
    /// Correct extruder steps/mm from a measured extrusion
    Adjust {
        /// Filament length before extruding (mm)
        #[arg(long)]
        initial: f64,
        /// Filament length measured after extruding (mm)
        #[arg(long)]
        remaining: f64,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Work done while connected
#[derive(Debug)]
enum SessionTask {
    Info,
    Temp { watch: bool },
    Send(String),
    Extrude(Measurement),
    Adjust(Measurement),
}

struct SessionContext {
    config: Config,
    ports: Vec<String>,
    auto_home: bool,
    json: bool,
    cancel: CancelToken,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json)?;
    tracing::debug!("extrudekit {} built {}", VERSION, BUILD_DATE);

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let task = match cli.command {
        Commands::Ports => return print_ports(cli.json),
        Commands::Config { save } => return print_config(&config, &config_path, save, cli.json),
        Commands::Info => SessionTask::Info,
        Commands::Temp { watch } => SessionTask::Temp { watch },
        Commands::Send { gcode } => SessionTask::Send(gcode),
        Commands::Extrude { initial, remaining } => {
            SessionTask::Extrude(Measurement::new(initial, remaining))
        }
        Commands::Adjust { initial, remaining } => {
            SessionTask::Adjust(Measurement::new(initial, remaining))
        }
    };

    let cancel = CancelToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping at the next poll");
            watcher.cancel();
        }
    });

    let context = SessionContext {
        ports: candidate_ports(&cli.ports, &config.connection),
        auto_home: cli.auto_home || config.connection.auto_home,
        json: cli.json,
        config,
        cancel,
    };

    tokio::task::spawn_blocking(move || run_session(context, task))
        .await
        .context("Session worker panicked")?
}

fn print_ports(json: bool) -> anyhow::Result<()> {
    let ports = list_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in ports {
        println!("{}\t{}", port.port_name, port.description);
    }
    Ok(())
}

fn print_config(config: &Config, path: &Path, save: bool, json: bool) -> anyhow::Result<()> {
    if save {
        config
            .save_to_file(path)
            .with_context(|| format!("Failed to save config to {}", path.display()))?;
        tracing::info!("Saved config to {}", path.display());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("# {}", path.display());
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

fn run_session(context: SessionContext, task: SessionTask) -> anyhow::Result<()> {
    // In JSON mode stdout carries results only
    let sink: SharedSink = if context.json {
        Arc::new(MessageLog::new())
    } else {
        Arc::new(ConsoleSink)
    };

    let mut manager = connection_manager(&context.config, sink.clone());
    let session = if context.ports.is_empty() {
        manager.connect_auto(&SystemPortEnumerator, context.auto_home)?
    } else {
        manager.connect(context.ports.as_slice(), context.auto_home)?
    };

    let outcome = run_task(&context, &session, sink, task);
    manager.disconnect();
    outcome
}

fn run_task(
    context: &SessionContext,
    session: &SharedSession,
    sink: SharedSink,
    task: SessionTask,
) -> anyhow::Result<()> {
    let json = context.json;
    match task {
        SessionTask::Info => {
            let inventory = printer_inventory(&context.config.inventory, sink);
            let record = session.exchange(|driver| inventory.refresh(driver))?;
            if json {
                println!("{}", record.to_json()?);
            } else {
                print!("{}", record);
            }
        }
        SessionTask::Temp { watch } => {
            let interval = Duration::from_millis(context.config.calibration.poll_interval_ms);
            let monitor = TemperatureMonitor::new(interval);
            if watch {
                monitor.run(session, &SystemClock, &context.cancel, |reading| {
                    print_reading(reading, json);
                    ControlFlow::Continue(())
                })?;
            } else {
                print_reading(monitor.poll_once(session)?, json);
            }
        }
        SessionTask::Send(gcode) => {
            let response = session.call(&Command::new(gcode), CollectionPolicy::UntilTerminal);
            if json {
                println!("{}", serde_json::to_string_pretty(response.lines())?);
            } else {
                for line in response.lines() {
                    println!("{}", line);
                }
            }
            if let Some(error) = response.error() {
                anyhow::bail!("Reply incomplete: {}", error);
            }
        }
        SessionTask::Extrude(measurement) => {
            let (mut workflow, runner) = calibration(context, sink);
            let length_mm = runner.extrude(&mut workflow, session, measurement)?;
            if json {
                let report = serde_json::json!({
                    "extruded_mm": length_mm,
                    "state": workflow.state(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        SessionTask::Adjust(measurement) => {
            let (mut workflow, runner) = calibration(context, sink);
            let (previous, new_steps) = runner.adjust_steps(&mut workflow, session, measurement)?;
            if json {
                let report = serde_json::json!({
                    "previous_steps_per_mm": previous,
                    "new_steps_per_mm": new_steps,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }
    Ok(())
}

fn calibration(
    context: &SessionContext,
    sink: SharedSink,
) -> (CalibrationWorkflow, CalibrationRunner) {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let workflow = CalibrationWorkflow::new(calibration_config(&context.config.calibration))
        .with_sink(sink)
        .with_clock(clock.clone());
    let runner = CalibrationRunner::new(clock, context.cancel.clone());
    (workflow, runner)
}

fn print_reading(reading: Option<TemperatureReport>, json: bool) {
    match (reading, json) {
        (Some(report), true) => match serde_json::to_string(&report) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::error!("Failed to encode reading: {}", e),
        },
        (Some(report), false) => println!("{}", report),
        (None, true) => println!("null"),
        (None, false) => println!("Failed to read hotend temperature."),
    }
}
