//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use hostlink_resolver::{ContextResolver, FsResolver, PipelineHandle};
use hostlink_shared::{AppConfig, Context, init_config, load_config, load_config_from};
use tracing::info;

use crate::script::Script;
use crate::simulate::{Outcome, Simulation};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// hostlink: keep a pipeline session in step with the artifact open in a host.
#[derive(Parser)]
#[command(
    name = "hostlink",
    version,
    about = "Drive pipeline engine sessions from host lifecycle events.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.hostlink/hostlink.toml.
    #[arg(long, env = "HOSTLINK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Replay a scripted sequence of host events against a headless host.
    Simulate {
        /// Simulation script (TOML).
        script: PathBuf,

        /// Hide job progress bars.
        #[arg(long)]
        no_progress: bool,
    },

    /// Resolve an artifact path to its pipeline context.
    Resolve {
        /// Artifact path.
        path: PathBuf,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "hostlink=warn",
        1 => "hostlink=info",
        2 => "hostlink=debug",
        _ => "hostlink=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Simulate {
            script,
            no_progress,
        } => cmd_simulate(config_path, &script, !no_progress),
        Command::Resolve { path, json } => cmd_resolve(config_path, &path, json),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_simulate(config_path: Option<&Path>, script_path: &Path, show_progress: bool) -> Result<()> {
    let config = config(config_path)?;
    let script = Script::load(script_path)?;

    info!(
        script = %script_path.display(),
        steps = script.steps.len(),
        engine = %config.engine.name,
        "starting simulation"
    );

    let mut sim = Simulation::new(&config, &script, show_progress);
    let outcomes = sim.run(&script);

    let failures = outcomes
        .iter()
        .filter(|o| matches!(o, Outcome::Failed(_)))
        .count();

    println!();
    match sim.state().previous_context() {
        Some(ctx) if sim.state().is_active() => println!("  Final state: active ({ctx})"),
        _ => println!("  Final state: disabled"),
    }
    println!("  Menus:       {}", sim.host().menu_names().join(", "));
    if let Some(project) = sim.host().project() {
        println!("  Project:     {}", project.display());
    }
    println!("  Failures:    {failures}");
    println!();

    Ok(())
}

fn cmd_resolve(config_path: Option<&Path>, path: &Path, json: bool) -> Result<()> {
    let config = config(config_path)?;
    let (pipeline, ctx) = resolve(&config, path)?;

    if json {
        let value = serde_json::json!({
            "pipeline": pipeline.name(),
            "root": pipeline.root(),
            "context": ctx,
            "folders": pipeline.paths_for_context(&ctx),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("  Pipeline: {} ({})", pipeline.name(), pipeline.root().display());
        println!("  Context:  {ctx}");
        for folder in pipeline.paths_for_context(&ctx) {
            println!("  Folder:   {}", folder.display());
        }
    }
    Ok(())
}

/// Locate the owning installation and resolve `path` within it.
fn resolve(config: &AppConfig, path: &Path) -> Result<(PipelineHandle, Context)> {
    let resolver = FsResolver::new(config.resolver.clone());
    let pipeline = resolver.pipeline_for_path(path)?;
    let ctx = resolver.context_from_path(&pipeline, path, None)?;
    Ok((pipeline, ctx))
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
