//! prpfleet - Run one PRPNet client per CPU core
//!
//! Provisions isolated slot directories from a shared client installation,
//! starts and stops the clients, and reports completed work units per slot.

#![allow(dead_code)] // Library-style API kept for tests and future subcommands

mod core;
mod platform;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::{ExtractedArchiveInstaller, Fleet, Identity, Settings};
use crate::platform::ProcessTable;

/// Application name constant
pub const APP_NAME: &str = "prpfleet";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const LICENCE: &str = "MIT License";

#[derive(Parser, Debug)]
#[command(name = "prpfleet")]
#[command(about = "Provision and supervise one PRPNet client per CPU core")]
#[command(version)]
struct Args {
    /// Client installation directory (overrides the settings file)
    #[arg(short, long, global = true)]
    base: Option<PathBuf>,

    /// Settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lay out the unpacked client and provision the slots
    Install {
        /// Address the server mails when a prime is found
        #[arg(long)]
        email: Option<String>,
        /// User name for server statistics
        #[arg(long)]
        userid: Option<String>,
        /// Distinguishes machines sharing one e-mail address
        #[arg(long, default_value = "")]
        machineid: String,
        /// Team credited with completed tests
        #[arg(long, default_value = "")]
        teamid: String,
        /// Number of slots (defaults to the number of CPUs)
        #[arg(long)]
        slots: Option<usize>,
    },
    /// Start one slot, or all slots when none is given
    Start { slot: Option<u32> },
    /// Stop every client on this host
    Stop {
        /// Seconds to wait between stopping helpers and clients
        #[arg(long)]
        grace: Option<u64>,
    },
    /// Completed work units and running state per slot
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Raw work records of every slot
    Workunits,
    /// Show the master configuration
    Config,
    /// Show the configured user id
    User,
    /// Show version information
    Version,
}

fn main() -> ExitCode {
    init_logging();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let settings_path = args.settings.unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {:?}", settings_path))?;

    let base = args.base.unwrap_or_else(|| settings.get_base_directory());
    let base = std::path::absolute(&base)
        .with_context(|| format!("Invalid base directory {:?}", base))?;

    match args.command {
        Command::Install {
            email,
            userid,
            machineid,
            teamid,
            slots,
        } => {
            let identity = match (email, userid) {
                (Some(email), Some(userid)) => Identity::new(email, userid)?
                    .with_machine(machineid)
                    .with_team(teamid),
                (None, None) => settings
                    .identity
                    .clone()
                    .context("No identity given: pass --email and --userid")?,
                _ => anyhow::bail!("--email and --userid must be given together"),
            };
            if slots.is_some() {
                settings.slot_count = slots;
                settings.validate();
            }

            let fleet = Fleet::new(&base, &settings);
            let installed = fleet
                .install(
                    &ExtractedArchiveInstaller::default(),
                    &identity,
                    settings.get_slot_count(),
                )
                .context("Install failed")?;
            println!("Installed {} slot(s) in {}", installed.len(), base.display());
        }
        Command::Start { slot } => {
            let fleet = Fleet::new(&base, &settings);
            match slot {
                Some(id) => {
                    fleet.start_slot(id)?;
                }
                None => {
                    let failures = fleet.start_all()?;
                    for failure in &failures {
                        eprintln!("warning: {}", failure);
                    }
                    if !failures.is_empty() {
                        anyhow::bail!("{} slot(s) failed to start", failures.len());
                    }
                }
            }
        }
        Command::Stop { grace } => {
            if let Some(secs) = grace {
                settings.grace_period_secs = secs;
            }
            let fleet = Fleet::new(&base, &settings);
            let signalled = fleet.stop_all(&ProcessTable::new());
            info!(
                "Stop requested for {} process(es) after {:?} grace",
                signalled,
                Duration::from_secs(settings.grace_period_secs)
            );
        }
        Command::Status { json } => {
            let entries = Fleet::new(&base, &settings).status()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{:>4}  {:<8}  WORKUNIT", "SLOT", "STATUS");
                for entry in entries {
                    println!("{:>4}  {:<8}  {}", entry.slot, entry.status, entry.unit);
                }
            }
        }
        Command::Workunits => {
            for (slot, lines) in Fleet::new(&base, &settings).work_lines()? {
                for line in lines {
                    println!("{}: {}", slot, line.trim());
                }
            }
        }
        Command::Config => {
            let master = Fleet::new(&base, &settings).master_config()?;
            for (key, value) in master.iter() {
                println!("{:14} : {}", key, value);
            }
        }
        Command::User => match Fleet::new(&base, &settings).user()? {
            Some(user) => println!("{}", user),
            None => anyhow::bail!("No userid in master configuration"),
        },
        Command::Version => println!("{}", version()),
    }
    Ok(())
}

fn version() -> String {
    let bits = if platform::is_64bit() { "64bit" } else { "32bit" };
    format!("{} {} ({})\n{}", APP_NAME, APP_VERSION, bits, LICENCE)
}

/// Initialize the logging system
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("prpfleet=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
