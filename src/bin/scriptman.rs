//! scriptman - terminal front-end for the script manager
//!
//! A thin presentation layer: every command maps onto one library call and
//! renders its result. Prompts and status messages go to the terminal.

// Exclude from coverage - CLI binary tested via integration tests
#![cfg_attr(tarpaulin, ignore)]

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use script_manager::core::scripts::{scan, CONFIG_FILE, DEFAULT_LOCALE};
use script_manager::{HostInterface, ManagerConfig, ScriptManager};
use tracing_subscriber::EnvFilter;

/// 📋 Script Manager: discover, inspect and run your Lua scripts.
#[derive(Parser, Debug)]
#[command(name = "scriptman")]
#[command(version = script_manager::VERSION)]
#[command(about = "📋 Script Manager: discover, inspect and run your Lua scripts")]
#[command(after_help = "EXAMPLES:
  # List discovered scripts
  scriptman list

  # Run a script and show what it printed
  scriptman run layers_example --capture

  # Check a file for risky calls without running it
  scriptman scan ./cleanup.lua

  # Reload automatically while editing scripts
  scriptman watch
")]
struct Cli {
    /// Scripts folder (overrides the config file)
    #[arg(long, short = 'd', global = true)]
    scripts_dir: Option<PathBuf>,

    /// JSON config file. Defaults to ./.script_manager.json when present
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Locale for prompts and the seeded example (e.g. pt_BR)
    #[arg(long, global = true)]
    locale: Option<String>,

    /// Log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List discovered scripts
    List {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a script by file name, bare name or path
    Run {
        script: String,
        /// Capture output instead of streaming it; warnings are reported, not asked
        #[arg(long)]
        capture: bool,
        /// Answer yes to the risk confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
        /// With --capture, print the result as JSON
        #[arg(long, requires = "capture")]
        json: bool,
    },
    /// Report risky operations in a file without running it
    Scan { file: PathBuf },
    /// Show scripts folder, counts and the docstring reference
    Info,
    /// Watch the scripts folder and reload on changes until interrupted
    Watch,
}

/// Terminal implementation of the host services
struct TerminalHost {
    assume_yes: bool,
    locale: String,
}

impl TerminalHost {
    fn new(assume_yes: bool) -> Self {
        let locale = std::env::var("LC_ALL")
            .or_else(|_| std::env::var("LANG"))
            .ok()
            .and_then(|l| l.split('.').next().map(str::to_string))
            .filter(|l| !l.is_empty() && l != "C" && l != "POSIX")
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        Self { assume_yes, locale }
    }
}

impl HostInterface for TerminalHost {
    fn show_status(&self, message: &str, _timeout: Duration, is_warning: bool) {
        if is_warning {
            eprintln!("{}", message);
        } else {
            println!("{}", message);
        }
    }

    fn confirm(&self, title: &str, message: &str) -> bool {
        eprintln!("{}\n{}", title, message);
        if self.assume_yes {
            eprintln!("[y/N] y (--yes)");
            return true;
        }
        eprint!("[y/N] ");
        let _ = io::stderr().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }

    fn alert_error(&self, title: &str, message: &str) {
        eprintln!("{}: {}", title, message);
    }

    fn locale(&self) -> String {
        self.locale.clone()
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "off",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ManagerConfig> {
    let mut config = match &cli.config {
        Some(path) => ManagerConfig::from_file(path)
            .with_context(|| format!("Could not load config file {}", path.display()))?,
        None => {
            let default_config = PathBuf::from(CONFIG_FILE);
            if default_config.exists() {
                ManagerConfig::from_file(&default_config).unwrap_or_else(|e| {
                    eprintln!("Warning: Could not load config file: {}", e);
                    ManagerConfig::default()
                })
            } else {
                ManagerConfig::default()
            }
        }
    };

    // Apply CLI overrides
    if let Some(dir) = &cli.scripts_dir {
        config.scripts_dir = dir.clone();
    }
    if let Some(locale) = &cli.locale {
        config.locale = Some(locale.clone());
    }
    if !matches!(cli.command, Command::Watch) {
        config.watch = false;
    }
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Scan { file } => scan_file(&file),
        Command::List { json } => list(&open(config, false)?, json),
        Command::Run {
            script,
            capture,
            yes,
            json,
        } => run_script(&mut open(config, yes)?, &script, capture, json),
        Command::Info => {
            print!("{}", open(config, false)?.summary());
            Ok(ExitCode::SUCCESS)
        }
        Command::Watch => watch(&mut open(config, false)?),
    }
}

fn open(config: ManagerConfig, assume_yes: bool) -> Result<ScriptManager> {
    ScriptManager::new(config, Box::new(TerminalHost::new(assume_yes)))
        .context("Could not start script manager")
}

fn list(manager: &ScriptManager, json: bool) -> Result<ExitCode> {
    let catalog = manager.list_scripts();

    if json {
        println!("{}", serde_json::to_string_pretty(&*catalog)?);
        return Ok(ExitCode::SUCCESS);
    }

    if catalog.is_empty() {
        println!("❌ No scripts found in {}", manager.scripts_dir().display());
        return Ok(ExitCode::SUCCESS);
    }

    println!("⚡ {} scripts in {}", catalog.len(), manager.scripts_dir().display());
    for record in catalog.values() {
        let mut flags = String::new();
        if record.toolbar_visible {
            flags.push_str(&format!(" [toolbar: {}]", record.toolbar_text()));
        }
        if record.validated {
            flags.push_str(" [validated]");
        }
        println!("   ├─ {} ({}){}", record.display_name, record.filename, flags);
        println!("   │    {}", record.description);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_script(manager: &mut ScriptManager, script: &str, capture: bool, json: bool) -> Result<ExitCode> {
    let path = manager.resolve(script);

    if !capture {
        let ok = manager.run_interactive(&path);
        return Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    let result = manager.run_captured(&path);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for warning in &result.warnings {
            eprintln!("{}", warning);
        }
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
        if !result.stderr.is_empty() && !result.stderr.ends_with('\n') {
            eprintln!();
        }
    }
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn scan_file(file: &Path) -> Result<ExitCode> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Could not read {}", file.display()))?;
    let warnings = scan(&source);

    if warnings.is_empty() {
        println!("✅ No risky operations detected in {}", file.display());
    } else {
        for warning in warnings {
            println!("{}", warning);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn watch(manager: &mut ScriptManager) -> Result<ExitCode> {
    if manager.watch_backend().is_none() {
        anyhow::bail!("Watching is disabled or unavailable for {}", manager.scripts_dir().display());
    }
    let changes = manager.subscribe();
    println!(
        "👀 Watching {} ({} scripts). Press Ctrl+C to stop.",
        manager.scripts_dir().display(),
        manager.list_scripts().len()
    );

    loop {
        manager.wait_for_events(Duration::from_secs(1));
        manager.process_events(Instant::now());
        while let Ok(event) = changes.try_recv() {
            if event.failed > 0 {
                eprintln!("⚠️ {} scripts failed to load (see log)", event.failed);
            }
        }
    }
}
