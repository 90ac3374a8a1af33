//! sentinel-modules: manage and load SENTINEL shell modules
//!
//! Usage:
//!   sentinel-modules load <name>... [--force] [--emit-shell]
//!   sentinel-modules session [--emit-shell]
//!   sentinel-modules enable|disable|sign|verify <name>
//!   sentinel-modules list [--available] [--json]
//!   sentinel-modules status [--json]
//!
//! Exit status is 0 on success and 1 when the command completed with
//! warnings. Shell integration evaluates the output of
//! `sentinel-modules session --emit-shell`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

use sentinel_modules::config::SentinelConfig;
use sentinel_modules::module::{LoadOptions, LoadOutcome, ModuleManager, SessionContext};
use sentinel_modules::utils::{env_opt, init_logging_from_config};

#[derive(Parser, Debug)]
#[command(name = "sentinel-modules")]
#[command(about = "Discover, verify and load SENTINEL shell modules")]
#[command(version)]
struct Cli {
    /// Configuration file (default: $SENTINEL_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Do not print module warnings on stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load modules (and their dependencies) and add them to the enabled list
    Load {
        #[arg(required = true)]
        names: Vec<String>,

        /// Re-execute modules already loaded
        #[arg(short, long)]
        force: bool,

        /// Print what the loaded modules changed as shell code for `eval`
        #[arg(long)]
        emit_shell: bool,
    },

    /// Load every enabled module, as done at shell startup
    Session {
        /// Print the resulting session as shell code for `eval`
        #[arg(long)]
        emit_shell: bool,
    },

    /// Add a module to the enabled list without loading it
    Enable { name: String },

    /// Remove a module from the enabled list
    Disable { name: String },

    /// List enabled modules
    List {
        /// List every discoverable module instead
        #[arg(short, long)]
        available: bool,

        #[arg(long)]
        json: bool,
    },

    /// Write the HMAC sidecar for a module
    Sign { name: String },

    /// Run integrity checks on a module without loading it
    Verify { name: String },

    /// Load the session and show the state of every module it touched
    Status {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("sentinel: error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Returns `false` when the command completed with warnings
fn run(cli: Cli) -> Result<bool> {
    let config_path = cli
        .config
        .or_else(|| env_opt("SENTINEL_CONFIG").filter(|p| !p.is_empty()).map(PathBuf::from));

    let mut config = SentinelConfig::load(config_path.as_deref())?;
    if cli.quiet {
        config.modules.quiet = true;
    }
    if cli.debug {
        config.logging.debug = true;
    }
    init_logging_from_config(&config);
    debug!("Configuration: {:?}", config);

    let manager = ModuleManager::new(&config);

    match cli.command {
        Commands::Load {
            names,
            force,
            emit_shell,
        } => {
            let mut ctx = SessionContext::from_env();
            let options = LoadOptions {
                force,
                ..LoadOptions::default()
            };
            let mut clean = true;
            for name in &names {
                let report = manager.load_module(name, &mut ctx, options);
                clean &= report.status.is_success() && !report.has_warnings();
            }
            if emit_shell {
                print!("{}", ctx.render_shell());
            }
            Ok(clean)
        }

        Commands::Session { emit_shell } => {
            let mut ctx = SessionContext::from_env();
            let report = manager.load_enabled(&mut ctx);
            if emit_shell {
                print!("{}", ctx.render_shell());
            }
            Ok(!report.has_warnings())
        }

        Commands::Enable { name } => {
            if manager.enable(&name)? {
                println!("enabled {}", name);
            } else {
                println!("{} is already enabled", name);
            }
            Ok(true)
        }

        Commands::Disable { name } => {
            if manager.disable(&name)? {
                println!("disabled {}", name);
            } else {
                println!("{} was not enabled", name);
            }
            Ok(true)
        }

        Commands::List { available, json } => {
            if available {
                let modules = manager.available();
                if json {
                    println!("{}", serde_json::to_string_pretty(&modules)?);
                } else {
                    for module in &modules {
                        let marker = if module.enabled { '*' } else { ' ' };
                        match &module.description {
                            Some(desc) => println!("{} {:<24} {}", marker, module.name, desc),
                            None => println!("{} {}", marker, module.name),
                        }
                    }
                }
            } else {
                let enabled = manager.list_enabled()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&enabled)?);
                } else {
                    for name in &enabled {
                        println!("{}", name);
                    }
                }
            }
            Ok(true)
        }

        Commands::Sign { name } => {
            let sidecar = manager
                .sign(&name)
                .with_context(|| format!("Failed to sign module {}", name))?;
            println!("wrote {}", sidecar.display());
            Ok(true)
        }

        Commands::Verify { name } => {
            let verdict = manager.verify(&name)?;
            for warning in &verdict.warnings {
                println!("{}", warning);
            }
            println!("{}: {}", name, if verdict.allowed { "allowed" } else { "blocked" });
            Ok(verdict.allowed && verdict.warnings.is_empty())
        }

        Commands::Status { json } => {
            let mut ctx = SessionContext::new();
            let report = manager.load_enabled(&mut ctx);
            let status = manager.status();
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                for entry in &status {
                    match &entry.outcome {
                        Some(LoadOutcome::Failed(reason)) => {
                            println!("{:<24} {} (failed: {})", entry.name, entry.state, reason)
                        }
                        _ => println!("{:<24} {}", entry.name, entry.state),
                    }
                }
            }
            Ok(!report.has_warnings())
        }
    }
}
