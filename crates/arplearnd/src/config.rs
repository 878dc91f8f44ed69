//! Command line configuration

use crate::debounce::{DEFAULT_DEBOUNCE_WINDOW, DEFAULT_RETENTION_MULTIPLIER};
use crate::error::{ArpLearnError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the compiled ARP classifier
pub const DEFAULT_BPF_OBJECT: &str = "/usr/lib/arplearnd/tc_arplistener.o";

/// Classifier program name inside the object
pub const DEFAULT_PROGRAM_NAME: &str = "arpReflect";

/// Ring buffer map name inside the object
pub const DEFAULT_EVENTS_MAP: &str = "events";

#[derive(Parser, Debug)]
#[command(name = "arplearnd")]
#[command(author, version, about = "Learn ARP bindings from monitored interfaces into the neighbor table", long_about = None)]
pub struct Args {
    /// Comma separated list of interfaces to listen for ARP traffic on
    #[arg(long, required = true, value_delimiter = ',')]
    pub attach_to: Vec<String>,

    /// Interface whose index is used for learned neighbor entries
    #[arg(long)]
    pub from_interface: String,

    /// Path to the compiled classifier object
    #[arg(long, default_value = DEFAULT_BPF_OBJECT)]
    pub bpf_object: PathBuf,

    /// Classifier program name in the object
    #[arg(long, default_value = DEFAULT_PROGRAM_NAME)]
    pub program: String,

    /// Events ring buffer map name in the object
    #[arg(long, default_value = DEFAULT_EVENTS_MAP)]
    pub events_map: String,

    /// Minimum seconds between upserts for the same address
    #[arg(long, default_value_t = DEFAULT_DEBOUNCE_WINDOW.as_secs())]
    pub debounce_secs: u64,

    /// Idle debounce entries are evicted after this many windows
    #[arg(long, default_value_t = DEFAULT_RETENTION_MULTIPLIER)]
    pub retention_multiplier: u32,

    /// Exit after this many consecutive read errors (0 = retry forever)
    #[arg(long, default_value = "0")]
    pub max_read_errors: u32,

    /// Serve Prometheus metrics on this localhost port
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: String,

    /// Emit JSON log lines
    #[arg(long)]
    pub log_json: bool,
}

/// Validated daemon configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerConfig {
    pub attach_to: Vec<String>,
    pub from_interface: String,
    pub bpf_object: PathBuf,
    pub program: String,
    pub events_map: String,
    pub debounce_window: Duration,
    pub retention_multiplier: u32,
    pub max_read_errors: u32,
    pub metrics_port: Option<u16>,
}

impl Args {
    pub fn into_config(self) -> Result<LearnerConfig> {
        let attach_to: Vec<String> = self
            .attach_to
            .into_iter()
            .map(|name| name.trim().to_string())
            .collect();
        if attach_to.is_empty() || attach_to.iter().any(String::is_empty) {
            return Err(ArpLearnError::Config(
                "--attach-to must list at least one interface and no empty names".to_string(),
            ));
        }

        let from_interface = self.from_interface.trim().to_string();
        if from_interface.is_empty() {
            return Err(ArpLearnError::Config(
                "--from-interface must not be empty".to_string(),
            ));
        }

        if self.debounce_secs == 0 {
            return Err(ArpLearnError::Config(
                "--debounce-secs must be greater than zero".to_string(),
            ));
        }
        if self.retention_multiplier == 0 {
            return Err(ArpLearnError::Config(
                "--retention-multiplier must be greater than zero".to_string(),
            ));
        }

        Ok(LearnerConfig {
            attach_to,
            from_interface,
            bpf_object: self.bpf_object,
            program: self.program,
            events_map: self.events_map,
            debounce_window: Duration::from_secs(self.debounce_secs),
            retention_multiplier: self.retention_multiplier,
            max_read_errors: self.max_read_errors,
            metrics_port: self.metrics_port,
        })
    }
}
