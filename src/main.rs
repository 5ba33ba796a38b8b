//! IDMT Relay Settings CLI
//!
//! Command-line interface for computing adaptive overcurrent relay settings
//! and plotting their time-current characteristics.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use idmt_relay_settings::relay::{CurveFamily, RelayInputs};
use idmt_relay_settings::session::{RelaySession, RenderChain, TextRenderer};
use idmt_relay_settings::storage::{self, AppConfig};
use idmt_relay_settings::system::{
    self, CORNER_CASES, ScenarioRanges, SurrogateModel, generate_scenarios, run_bench,
    run_comparison,
};
use idmt_relay_settings::utils::format::{format_pickup, format_tms, format_trip_time};
use idmt_relay_settings::utils::parsing::{
    SessionCommand, parse_current, parse_curve_family, parse_session_command, parse_switch,
};
use idmt_relay_settings::utils::tcc_chart::{
    ChartConfig, PngChartRenderer, comparison_chart, view_chart,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Adaptive IDMT overcurrent relay settings tool
#[derive(Parser, Debug)]
#[command(name = "idmt-relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Relay inputs; each flag overrides the config startup value.
#[derive(clap::Args, Debug, Clone, Default)]
struct InputArgs {
    /// Minimum fault current, e.g. 5000 or 4.5kA
    #[arg(long, value_parser = current_arg)]
    fault: Option<f64>,

    /// Maximum load current, e.g. 800
    #[arg(long, value_parser = current_arg)]
    load: Option<f64>,

    /// Adaptive (IBR) mode: on or off
    #[arg(long, value_parser = switch_arg)]
    adaptive: Option<bool>,

    /// Curve family: standard, very or extreme
    #[arg(long, value_parser = curve_arg)]
    curve: Option<CurveFamily>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute pickup current and TMS
    Settings {
        #[command(flatten)]
        inputs: InputArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the sampled time-current characteristic
    Curve {
        #[command(flatten)]
        inputs: InputArgs,

        #[arg(long)]
        json: bool,
    },

    /// Draw the characteristic to a PNG
    Plot {
        #[command(flatten)]
        inputs: InputArgs,

        /// Output image path
        #[arg(short, long, default_value = "tcc.png")]
        output: PathBuf,
    },

    /// Change inputs line by line and see the settings follow
    Interactive {
        #[command(flatten)]
        inputs: InputArgs,

        /// Also redraw this PNG after every change
        #[arg(long)]
        png: Option<PathBuf>,
    },

    /// Step the fault current across a range, re-rendering each step
    Sweep {
        #[command(flatten)]
        inputs: InputArgs,

        /// First fault current
        #[arg(long, value_parser = current_arg)]
        from: f64,

        /// Last fault current
        #[arg(long, value_parser = current_arg)]
        to: f64,

        /// Number of steps, ends included
        #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
        steps: u32,

        /// Delay between steps in milliseconds
        #[arg(long, default_value = "500")]
        interval_ms: u64,

        /// Also redraw this PNG at every step
        #[arg(long)]
        png: Option<PathBuf>,
    },

    /// Compare fixed settings with adaptive settings on the feeder model
    Study {
        #[arg(long, value_parser = curve_arg)]
        curve: Option<CurveFamily>,

        /// Write the comparison chart to this PNG
        #[arg(long)]
        plot: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Evaluate settings under stressed network conditions
    Bench {
        #[arg(long, value_parser = curve_arg)]
        curve: Option<CurveFamily>,

        /// Surrogate weights to compare against (defaults to the trained model
        /// in the config directory, when present)
        #[arg(long)]
        model: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Train the neural surrogate on generated scenarios
    Train {
        /// Number of training scenarios
        #[arg(short = 'n', long, default_value = "2000")]
        count: usize,

        /// Scenario RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Where to write the weights (defaults to the config directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_parser = curve_arg)]
        curve: Option<CurveFamily>,
    },

    /// Generate random labelled scenarios as CSV
    Dataset {
        /// Number of scenarios
        #[arg(short = 'n', long, default_value = "1000")]
        count: usize,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_parser = curve_arg)]
        curve: Option<CurveFamily>,
    },

    /// List the supported curve families
    Curves,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config
    Show,
    /// Print the config file location
    Path,
}

fn current_arg(s: &str) -> std::result::Result<f64, String> {
    parse_current(s).map_err(|e| e.to_string())
}

fn switch_arg(s: &str) -> std::result::Result<bool, String> {
    parse_switch(s).map_err(|e| e.to_string())
}

fn curve_arg(s: &str) -> std::result::Result<CurveFamily, String> {
    parse_curve_family(s).map_err(|e| e.to_string())
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config_path = match args.config {
        Some(path) => path,
        None => storage::get_config_path().context("Failed to locate config file")?,
    };

    if let Command::Config { action } = &args.command {
        return cmd_config(action, &config_path);
    }

    let config = storage::load_config_from(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    match args.command {
        Command::Settings { inputs, json } => cmd_settings(&config, &inputs, json),
        Command::Curve { inputs, json } => cmd_curve(&config, &inputs, json),
        Command::Plot { inputs, output } => cmd_plot(&config, &inputs, &output),
        Command::Interactive { inputs, png } => cmd_interactive(&config, &inputs, png),
        Command::Sweep {
            inputs,
            from,
            to,
            steps,
            interval_ms,
            png,
        } => cmd_sweep(&config, &inputs, from, to, steps, interval_ms, png),
        Command::Study { curve, plot, json } => cmd_study(&config, curve, plot.as_deref(), json),
        Command::Bench { curve, model, json } => {
            cmd_bench(&config, curve, model.as_deref(), json)
        }
        Command::Train {
            count,
            seed,
            output,
            curve,
        } => cmd_train(&config, count, seed, output, curve),
        Command::Dataset {
            count,
            seed,
            output,
            curve,
        } => cmd_dataset(&config, count, seed, output.as_deref(), curve),
        Command::Curves => cmd_curves(),
        Command::Config { .. } => Ok(()),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    // -v wins over RUST_LOG
    let filter = if verbose > 0 {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Helpers
// =============================================================================

/// Startup inputs from config with CLI overrides applied.
fn resolve_inputs(config: &AppConfig, args: &InputArgs) -> Result<RelayInputs> {
    let mut inputs = config
        .startup
        .to_inputs()
        .context("Invalid startup inputs in config")?;

    if let Some(fault) = args.fault {
        inputs.set_fault_current(fault)?;
    }
    if let Some(load) = args.load {
        inputs.set_load_current(load)?;
    }
    if let Some(adaptive) = args.adaptive {
        inputs.set_adaptive_mode(adaptive);
    }
    if let Some(curve) = args.curve {
        inputs.set_curve_family(curve);
    }
    Ok(inputs)
}

fn open_session(config: &AppConfig, args: &InputArgs) -> Result<RelaySession> {
    RelaySession::new(
        resolve_inputs(config, args)?,
        config.settings.clone(),
        config.sampling.clone(),
    )
    .context("Invalid policy in config")
}

fn chart_config(config: &AppConfig) -> Result<ChartConfig> {
    ChartConfig::from_stored(&config.chart).context("Invalid chart config")
}

// =============================================================================
// Command Implementations
// =============================================================================

fn cmd_settings(config: &AppConfig, args: &InputArgs, json: bool) -> Result<()> {
    let view = open_session(config, args)?.view();

    if json {
        let summary = serde_json::json!({
            "fault_current": view.fault_current,
            "load_current": view.load_current,
            "mode": view.mode.name(),
            "curve_family": view.curve_family,
            "pickup_current": view.pickup_current,
            "time_multiplier": view.time_multiplier,
            "psm": view.psm,
            "trip_time": view.trip_time,
            "sensitivity_clamped": view.sensitivity_clamped,
            "tms_clamped": view.tms_clamped,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", view);
    }
    Ok(())
}

fn cmd_curve(config: &AppConfig, args: &InputArgs, json: bool) -> Result<()> {
    let view = open_session(config, args)?.view();

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!(
        "IEC {} | Is = {} | TMS = {}",
        view.curve_family.name(),
        view.display.pickup_current,
        view.display.time_multiplier
    );
    println!("{:>12}  {:>6}  {:>10}", "Current (A)", "PSM", "Time (s)");
    for sample in &view.curve {
        println!(
            "{:>12.1}  {:>6.2}  {:>10.3}",
            sample.current,
            sample.current / view.pickup_current,
            sample.trip_time
        );
    }
    match view.operating_point.first() {
        Some(point) => println!(
            "\nOperating point: {:.0} A trips in {:.3} s",
            point.current, point.trip_time
        ),
        None => println!("\nNo operating point: fault current too close to pickup"),
    }
    Ok(())
}

fn cmd_plot(config: &AppConfig, args: &InputArgs, output: &Path) -> Result<()> {
    let view = open_session(config, args)?.view();
    view_chart(&view, &chart_config(config)?)
        .save(output)
        .with_context(|| format!("Failed to write chart to {}", output.display()))?;

    println!("Chart written to {}", output.display());
    print!("{}", view);
    Ok(())
}

const INTERACTIVE_HELP: &str = "\
Commands:
  fault <amps>        set minimum fault current (e.g. fault 4.5kA)
  load <amps>         set maximum load current
  adaptive <on|off>   switch IBR adaptive mode
  curve <family>      standard, very or extreme
  show                redraw
  help                this text
  quit                leave";

fn cmd_interactive(config: &AppConfig, args: &InputArgs, png: Option<PathBuf>) -> Result<()> {
    let mut session = open_session(config, args)?;
    let mut text = TextRenderer::new(std::io::stdout());
    let mut png = match png {
        Some(path) => Some(PngChartRenderer::new(path, chart_config(config)?)),
        None => None,
    };

    let mut chain = RenderChain::new().with(&mut text);
    if let Some(png) = png.as_mut() {
        chain = chain.with(png);
    }

    println!("{}\n", INTERACTIVE_HELP);
    session.refresh(&mut chain).context("Failed to render")?;

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("relay> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("Failed to read stdin")?;

        match parse_session_command(&line) {
            Ok(SessionCommand::Apply(input)) => {
                if let Err(e) = session.apply(input, &mut chain) {
                    eprintln!("Error: {}", e);
                }
            }
            Ok(SessionCommand::Show) => session.refresh(&mut chain)?,
            Ok(SessionCommand::Help) => println!("{}", INTERACTIVE_HELP),
            Ok(SessionCommand::Quit) => break,
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    println!();
    Ok(())
}

fn cmd_sweep(
    config: &AppConfig,
    args: &InputArgs,
    from: f64,
    to: f64,
    steps: u32,
    interval_ms: u64,
    png: Option<PathBuf>,
) -> Result<()> {
    let mut session = open_session(config, args)?;
    let mut text = TextRenderer::new(std::io::stdout());
    let mut png = match png {
        Some(path) => Some(PngChartRenderer::new(path, chart_config(config)?)),
        None => None,
    };

    let mut chain = RenderChain::new().with(&mut text);
    if let Some(png) = png.as_mut() {
        chain = chain.with(png);
    }

    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    for step in 0..steps {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let fault = if steps == 1 {
            from
        } else {
            from + (to - from) * step as f64 / (steps - 1) as f64
        };

        // Clear screen and move cursor to top
        print!("\x1B[2J\x1B[1;1H");
        println!("Sweep step {}/{} (Ctrl+C to stop)", step + 1, steps);
        session
            .set_fault_current(fault, &mut chain)
            .with_context(|| format!("Failed to apply fault current {} A", fault))?;

        if step + 1 < steps {
            std::thread::sleep(Duration::from_millis(interval_ms));
        }
    }

    if !running.load(Ordering::SeqCst) {
        println!("\nSweep stopped.");
    }
    Ok(())
}

fn cmd_study(
    config: &AppConfig,
    curve: Option<CurveFamily>,
    plot: Option<&Path>,
    json: bool,
) -> Result<()> {
    let curve = curve.unwrap_or(config.startup.curve);
    let study = run_comparison(&config.system, curve, &config.settings, &config.sampling)
        .context("Failed to run comparison study")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&study)?);
    } else {
        println!("Fixed vs adaptive protection, IEC {}", curve.name());
        println!(
            "Grid fault: {:.0} A | Grid + IBR fault: {:.0} A\n",
            study.grid_fault_current, study.total_fault_current
        );
        println!(
            "{:<20} {:>10} {:>12} {:>8} {:>10}",
            "Scheme", "Fault (A)", "Is", "TMS", "Trip"
        );
        for scheme in [&study.fixed, &study.adaptive] {
            println!(
                "{:<20} {:>10.0} {:>12} {:>8} {:>10}",
                scheme.label,
                scheme.fault_current,
                format_pickup(scheme.pickup_current),
                format_tms(scheme.time_multiplier),
                format_trip_time(scheme.trip_time)
            );
        }
    }

    if let Some(path) = plot {
        comparison_chart(&study, &chart_config(config)?)
            .save(path)
            .with_context(|| format!("Failed to write chart to {}", path.display()))?;
        eprintln!("Chart written to {}", path.display());
    }
    Ok(())
}

/// Explicit weights must load; the default location is optional.
fn load_surrogate(model: Option<&Path>) -> Result<Option<SurrogateModel>> {
    let (path, required) = match model {
        Some(path) => (path.to_path_buf(), true),
        None => (storage::get_model_path()?, false),
    };
    if !required && !path.exists() {
        tracing::info!(path = %path.display(), "no trained surrogate, analytical bench only");
        return Ok(None);
    }
    SurrogateModel::load_from(&path)
        .map(Some)
        .with_context(|| format!("Failed to load surrogate from {}", path.display()))
}

fn cmd_bench(
    config: &AppConfig,
    curve: Option<CurveFamily>,
    model: Option<&Path>,
    json: bool,
) -> Result<()> {
    let curve = curve.unwrap_or(config.startup.curve);
    let surrogate = load_surrogate(model)?;
    let results = run_bench(&CORNER_CASES, curve, &config.settings, surrogate.as_ref())
        .context("Failed to run bench")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!(
        "{:<28} {:>4} {:>9} {:>12} {:>7} {:>7} {:>9} {:>12} {:>7}  Notes",
        "Scenario", "IBR", "Fault", "Is", "TMS", "PSM", "Trip", "ML Is", "ML TMS"
    );
    for r in &results {
        let mut notes = Vec::new();
        if r.sensitivity_clamped {
            notes.push("sensitivity clamp".to_string());
        }
        if r.tms_clamped {
            notes.push("TMS limited".to_string());
        }
        let (ml_is, ml_tms) = match &r.surrogate {
            Some(ml) => {
                notes.push(format!(
                    "diff {:.1} A / {:.4}",
                    ml.pickup_error, ml.tms_error
                ));
                (format_pickup(ml.pickup_current), format_tms(ml.time_multiplier))
            }
            None => ("-".to_string(), "-".to_string()),
        };
        println!(
            "{:<28} {:>4} {:>9.0} {:>12} {:>7} {:>7.2} {:>9} {:>12} {:>7}  {}",
            r.scenario,
            if r.ibr_active { "on" } else { "off" },
            r.fault_current,
            format_pickup(r.pickup_current),
            format_tms(r.time_multiplier),
            r.psm,
            format_trip_time(r.trip_time),
            ml_is,
            ml_tms,
            notes.join(", ")
        );
    }
    Ok(())
}

fn cmd_train(
    config: &AppConfig,
    count: usize,
    seed: u64,
    output: Option<PathBuf>,
    curve: Option<CurveFamily>,
) -> Result<()> {
    let records = generate_scenarios(
        count,
        seed,
        &ScenarioRanges::default(),
        curve.unwrap_or(CurveFamily::Standard),
        &config.settings,
    )
    .context("Failed to generate scenarios")?;

    let (model, report) =
        SurrogateModel::train(&records, &config.training).context("Failed to train surrogate")?;

    let path = match output {
        Some(path) => path,
        None => storage::get_model_path()?,
    };
    model
        .save_to(&path)
        .with_context(|| format!("Failed to save surrogate to {}", path.display()))?;

    println!(
        "Trained on {} scenarios for {} epochs",
        records.len(),
        config.training.epochs
    );
    if let (Some(first), Some(last)) = (report.initial_loss(), report.final_loss()) {
        println!("Loss (normalised MSE): {:.6} -> {:.6}", first, last);
    }
    println!("Weights written to {}", path.display());
    Ok(())
}

fn cmd_dataset(
    config: &AppConfig,
    count: usize,
    seed: u64,
    output: Option<&Path>,
    curve: Option<CurveFamily>,
) -> Result<()> {
    let records = generate_scenarios(
        count,
        seed,
        &ScenarioRanges::default(),
        curve.unwrap_or(CurveFamily::Standard),
        &config.settings,
    )
    .context("Failed to generate scenarios")?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            system::write_csv(&records, std::io::BufWriter::new(file))?;
            eprintln!("Wrote {} scenarios to {}", records.len(), path.display());
        }
        None => system::write_csv(&records, std::io::stdout().lock())?,
    }
    Ok(())
}

fn cmd_curves() -> Result<()> {
    println!("{:<10} {:<20} {:>8} {:>8}", "ID", "Name", "k", "alpha");
    for family in CurveFamily::ALL {
        let params = family.parameters();
        println!(
            "{:<10} {:<20} {:>8} {:>8}",
            family.id(),
            family.name(),
            params.k,
            params.alpha
        );
    }
    Ok(())
}

fn cmd_config(action: &ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            if *force {
                storage::save_config_to(&AppConfig::default(), path)?;
                println!("Default config written to {}", path.display());
            } else if storage::ensure_config_exists(path)? {
                println!("Default config written to {}", path.display());
            } else {
                println!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
        }
        ConfigAction::Show => {
            let config = storage::load_config_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(())
}
