//! jessi-core diagnostic tool
//!
//! Prints the capability probes, shows or writes the configuration file and
//! sends test exception reports through the real kernel transport.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use jessi_core::config::Config;
use jessi_core::kern::thread_state::{ARM_THREAD_STATE64, ARM_THREAD_STATE64_COUNT};
use jessi_core::probe::{Capabilities, HostSignals};
use jessi_core::{
    ExceptionBehavior, ExceptionReport, ExceptionType, KernelTransport, MachExcClient, PortName,
    ThreadState,
};

#[derive(Parser)]
#[command(name = "jessi-core")]
#[command(about = "JESSI native layer diagnostics", long_about = None)]
struct Cli {
    /// Configuration file (default: $JESSI_CORE_CONFIG or ./jessi-core.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every capability probe
    Probe,

    /// Print the effective configuration as TOML
    ShowConfig,

    /// Write the default configuration
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Send one exception report and wait for the handler's reply
    Raise {
        /// Exception port name (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_port)]
        endpoint: PortName,

        /// Faulting thread port name
        #[arg(long, value_parser = parse_port, default_value = "0")]
        thread: PortName,

        /// Task port name
        #[arg(long, value_parser = parse_port, default_value = "0")]
        task: PortName,

        /// Exception kind: name (breakpoint, EXC_BAD_ACCESS) or number
        #[arg(long, value_parser = parse_exception, default_value = "breakpoint")]
        exception: ExceptionType,

        /// Code words, at most two
        #[arg(long = "code", allow_negative_numbers = true)]
        codes: Vec<i64>,

        /// Which routine to use
        #[arg(long, value_enum, default_value_t = Behavior::Default)]
        behavior: Behavior,

        /// Thread state flavor for the state behaviors
        #[arg(long, default_value_t = ARM_THREAD_STATE64)]
        flavor: i32,

        /// Number of zero words sent as the old state
        #[arg(long, default_value_t = ARM_THREAD_STATE64_COUNT)]
        state_words: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Behavior {
    Default,
    State,
    StateIdentity,
}

impl From<Behavior> for ExceptionBehavior {
    fn from(b: Behavior) -> Self {
        match b {
            Behavior::Default => ExceptionBehavior::DEFAULT,
            Behavior::State => ExceptionBehavior::STATE,
            Behavior::StateIdentity => ExceptionBehavior::STATE_IDENTITY,
        }
    }
}

fn parse_port(s: &str) -> Result<PortName, String> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    value.map(PortName).map_err(|e| format!("invalid port name {s:?}: {e}"))
}

fn parse_exception(s: &str) -> Result<ExceptionType, String> {
    if let Ok(raw) = s.parse::<i32>() {
        return ExceptionType::from_raw(raw).ok_or_else(|| format!("unknown exception {raw}"));
    }
    let wanted = s.to_ascii_uppercase().replace('-', "_");
    ExceptionType::ALL
        .iter()
        .copied()
        .find(|e| e.name() == wanted || e.name().strip_prefix("EXC_") == Some(wanted.as_str()))
        .ok_or_else(|| format!("unknown exception {s:?}"))
}

fn init_logging(config: &Config) {
    let default_filter = config.log_filter.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    init_logging(&config);

    match cli.command {
        Command::Probe => {
            let caps = Capabilities::with_config(HostSignals::new(), config.probe.clone());
            println!("{}", caps.report());
        }

        Command::ShowConfig => {
            print!("{}", config.to_toml()?);
        }

        Command::InitConfig { force } => {
            if config_path.exists() && !force {
                bail!("{} exists, pass --force to overwrite", config_path.display());
            }
            Config::default().save(&config_path)?;
            info!("wrote {}", config_path.display());
        }

        Command::Raise {
            endpoint,
            thread,
            task,
            exception,
            codes,
            behavior,
            flavor,
            state_words,
        } => {
            let report = ExceptionReport::new(exception, &codes, thread, task)?;
            let mut state = ThreadState::from_slice(&vec![0; state_words])?;
            let mut flavor = flavor;

            let client = MachExcClient::new(KernelTransport::new());
            client
                .deliver(endpoint, behavior.into(), &report, &mut flavor, &mut state)
                .with_context(|| format!("raising {} to {}", exception, endpoint))?;

            println!("handler accepted {}", exception);
            if ExceptionBehavior::from(behavior).includes_state() {
                println!("reply flavor {}, {} state words", flavor, state.len());
            }
        }
    }

    Ok(())
}
