//! iconsync command-line tool.
//!
//! Checks that the icons of a development repository and a design repository
//! agree, optionally copying dev-authored changes into the design repository,
//! and generates / validates configuration files.

mod style;
mod view;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use iconsync_core::errors::CoreError;
use iconsync_core::{CheckOptions, ErrorHandler, IconChecker, IconSyncConfig};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "iconsync.toml";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// iconsync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "iconsync",
    version,
    about = "Keep UI icons consistent between a design and a development repository"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare both repositories and report diverging icons.
    Check(CheckArgs),

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./iconsync.toml")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file.
    Validate,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    /// Development repository (overrides `repos.dev_dir`).
    #[arg(long)]
    dev_dir: Option<String>,

    /// Design repository or icon directory (overrides `repos.icons_dir`).
    #[arg(long)]
    icons_dir: Option<String>,

    /// Directory-name pattern to skip in the dev repository.
    #[arg(long)]
    skip_dirs: Option<String>,

    /// Copy dev-authored changes into the design repository.
    #[arg(long)]
    sync: bool,

    /// Exit successfully even when icons diverge.
    #[arg(long)]
    allow_divergence: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Also list consistent icons.
    #[arg(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output, force } => {
            init_logging("warn");
            cmd_init(&output, force)
        }
        Commands::Validate => {
            init_logging("warn");
            cmd_validate(&config_path(cli.config.as_deref()))
        }
        Commands::Check(args) => {
            let config = load_config(cli.config.as_deref())?;
            init_logging(&config.log.level);
            cmd_check(config, args).await
        }
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn config_path(explicit: Option<&str>) -> PathBuf {
    PathBuf::from(expand_tilde(explicit.unwrap_or(DEFAULT_CONFIG_FILE)))
}

/// Load the given config file; without `--config` the default file is
/// optional.
fn load_config(explicit: Option<&str>) -> Result<IconSyncConfig> {
    let path = config_path(explicit);
    if explicit.is_none() && !path.exists() {
        return Ok(IconSyncConfig::default());
    }
    IconSyncConfig::load_from_file(&path)
        .with_context(|| format!("failed to load configuration file {}", path.display()))
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Records divergence so the report is printed before the exit status is
/// decided.
#[derive(Default)]
struct DeferDivergence {
    flagged: AtomicBool,
}

impl ErrorHandler for DeferDivergence {
    fn on_divergence(&self, _summary: &str) -> Result<(), CoreError> {
        self.flagged.store(true, Ordering::Relaxed);
        Ok(())
    }
}

async fn cmd_check(mut config: IconSyncConfig, args: CheckArgs) -> Result<()> {
    if let Some(dir) = args.dev_dir {
        config.repos.dev_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = args.icons_dir {
        config.repos.icons_dir = Some(PathBuf::from(dir));
    }
    if args.skip_dirs.is_some() {
        config.scan.skip_dirs_pattern = args.skip_dirs;
    }
    if args.sync {
        config.sync.enabled = true;
    }
    for dir in [&mut config.repos.dev_dir, &mut config.repos.icons_dir]
        .into_iter()
        .flatten()
    {
        if let Some(s) = dir.to_str() {
            *dir = PathBuf::from(expand_tilde(s));
        }
    }

    let options = CheckOptions::from_config(&config).context("invalid check options")?;
    let handler = DeferDivergence::default();
    let report = IconChecker::with_defaults()
        .run(&options, &handler)
        .await
        .context("icon check failed")?;

    if args.json {
        println!("{}", report.to_json().context("failed to serialize report")?);
    } else {
        view::print_report(&report, args.verbose);
    }

    if report.sync_failed {
        bail!("sync failed");
    }
    if handler.flagged.load(Ordering::Relaxed) && !args.allow_divergence {
        bail!("icons are not in sync");
    }
    Ok(())
}

fn cmd_init(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }
    std::fs::write(output, IconSyncConfig::template())
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "{}",
        style::success(&format!(
            "Default configuration written to {}",
            output.display()
        ))
    );
    println!();
    println!("Next steps:");
    println!("  1. Set repos.dev_dir and repos.icons_dir");
    println!(
        "  2. Validate the config:  iconsync validate --config {}",
        output.display()
    );
    println!(
        "  3. Run a check:          iconsync check --config {}",
        output.display()
    );
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = IconSyncConfig::load_from_file(config_path)
        .context("failed to parse configuration file")?;
    println!("  {}", style::success("TOML structure is valid"));

    if let Err(e) = config.validate() {
        println!("  {}", style::error(&format!("Validation error: {}", e)));
        bail!("configuration is invalid");
    }
    println!("  {}", style::success("All required fields are valid"));

    let show = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not set)".into())
    };
    println!();
    println!("Configuration summary:");
    println!("  Dev dir        : {}", show(&config.repos.dev_dir));
    println!("  Icons dir      : {}", show(&config.repos.icons_dir));
    println!(
        "  Skip pattern   : {}",
        config.scan.skip_dirs_pattern.as_deref().unwrap_or("(none)")
    );
    println!("  Sync enabled   : {}", config.sync.enabled);
    println!("  Max lookups    : {}", config.sync.max_concurrent_lookups);
    println!("  Log level      : {}", config.log.level);
    for dir in [&config.repos.dev_dir, &config.repos.icons_dir]
        .into_iter()
        .flatten()
    {
        if !Path::new(&expand_tilde(&dir.to_string_lossy())).is_dir() {
            println!(
                "  {}",
                style::warn(&format!("{} does not exist", dir.display()))
            );
        }
    }
    println!();
    println!("Configuration is valid.");
    Ok(())
}
