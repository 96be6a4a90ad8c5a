use std::{path::PathBuf, time::Duration};

use clap::Parser;
use regex::Regex;

use crate::{retry::RetryPolicy, shell::CommandLine, Result, SurveyError};

/// Primary application configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    /// Label for the files, prompted for when absent
    pub location: Option<String>,

    /// Directory the output files are written to
    pub output_dir: PathBuf,

    pub scan: ScanConfig,

    pub retry: RetryPolicy,

    pub connection: ConnectionConfig,

    pub peers: PeerConfig,

    /// Whether to ask before restarting an exhausted round of scans
    pub prompt: bool,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub command: CommandLine,

    /// Only rows for this SSID are kept
    pub ssid: String,
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Whether to capture the current connection at all
    pub enabled: bool,

    pub command: CommandLine,
}

#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Interfaces whose name matches are treated as wireless
    pub interface_pattern: Regex,

    /// Neighbor table lines matching this are counted as peers
    pub hostname_pattern: Regex,

    pub ping_program: String,

    pub ping_count: u32,

    pub neighbor_command: CommandLine,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            command: CommandLine::new("airport", ["-s"]),
            ssid: DEFAULT_SSID.to_string(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: CommandLine::new("airport", ["-I"]),
        }
    }
}

impl PeerConfig {
    pub fn new(interface_pattern: &str, hostname_pattern: &str) -> Result<Self> {
        Ok(Self {
            interface_pattern: compile("interface pattern", interface_pattern)?,
            hostname_pattern: compile("peer pattern", hostname_pattern)?,
            ping_program: "ping".to_string(),
            ping_count: 5,
            neighbor_command: CommandLine::new("arp", ["-a"]),
        })
    }
}

const DEFAULT_SSID: &str = "wpa.mcgill.ca";
const DEFAULT_INTERFACE_PATTERN: &str = r"^(?:wl|en0$)";
const DEFAULT_PEER_PATTERN: &str = r"(?i)\.mcgill\.ca\b";

fn compile(what: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| SurveyError::ConfigError(format!("invalid {what} {pattern:?}: {e}")))
}

impl Config {
    /// Create a new config from CLI arguments
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.attempts == 0 {
            return Err(SurveyError::ConfigError(
                "attempts must be at least 1".into(),
            ));
        }
        // `ping -c 0` never stops on BSD and macOS.
        if cli.ping_count == 0 {
            return Err(SurveyError::ConfigError(
                "ping count must be at least 1".into(),
            ));
        }

        let scan = ScanConfig {
            command: cli.scan_cmd.parse()?,
            ssid: cli.ssid.clone(),
        };

        let retry = RetryPolicy {
            max_attempts: cli.attempts,
            delay: Duration::from_millis(cli.retry_delay_ms),
        };

        let connection = ConnectionConfig {
            enabled: !cli.skip_connection,
            command: cli.info_cmd.parse()?,
        };

        let peers = PeerConfig {
            ping_count: cli.ping_count,
            neighbor_command: cli.neighbor_cmd.parse()?,
            ..PeerConfig::new(&cli.interface_pattern, &cli.peer_pattern)?
        };

        Ok(Self {
            location: cli.location.clone(),
            output_dir: cli.output_dir.clone(),
            scan,
            retry,
            connection,
            peers,
            prompt: !cli.no_prompt,
        })
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Where the reading is taken. Prompted for when omitted.
    #[arg(short = 'l', long = "location", env = "SURVEY_LOCATION")]
    pub location: Option<String>,

    #[arg(
        short = 'o',
        long = "output-dir",
        env = "SURVEY_OUTPUT_DIR",
        default_value = ".",
        help = "Directory to write the CSV and JSON files to"
    )]
    pub output_dir: PathBuf,

    #[arg(
        short = 's',
        long = "ssid",
        env = "SURVEY_SSID",
        default_value = DEFAULT_SSID,
        help = "Network whose access points are recorded"
    )]
    pub ssid: String,

    #[arg(
        short = 'a',
        long = "attempts",
        env = "SURVEY_ATTEMPTS",
        default_value = "5",
        help = "Scan attempts per round before asking to retry"
    )]
    pub attempts: u32,

    #[arg(
        long = "retry-delay-ms",
        env = "SURVEY_RETRY_DELAY_MS",
        default_value = "1000",
        help = "Pause between failed scan attempts"
    )]
    pub retry_delay_ms: u64,

    #[arg(
        long = "scan-cmd",
        env = "SURVEY_SCAN_CMD",
        default_value = "airport -s",
        help = "Command listing visible networks"
    )]
    pub scan_cmd: String,

    #[arg(
        long = "info-cmd",
        env = "SURVEY_INFO_CMD",
        default_value = "airport -I",
        help = "Command printing the current connection as key: value lines"
    )]
    pub info_cmd: String,

    #[arg(
        long = "neighbor-cmd",
        env = "SURVEY_NEIGHBOR_CMD",
        default_value = "arp -a",
        help = "Command dumping the neighbor (ARP) table"
    )]
    pub neighbor_cmd: String,

    #[arg(
        long = "ping-count",
        env = "SURVEY_PING_COUNT",
        default_value = "5",
        help = "Echo requests sent to each broadcast address"
    )]
    pub ping_count: u32,

    #[arg(
        long = "interface-pattern",
        env = "SURVEY_INTERFACE_PATTERN",
        default_value = DEFAULT_INTERFACE_PATTERN,
        help = "Regex selecting wireless interfaces by name"
    )]
    pub interface_pattern: String,

    #[arg(
        long = "peer-pattern",
        env = "SURVEY_PEER_PATTERN",
        default_value = DEFAULT_PEER_PATTERN,
        help = "Regex a neighbor table line must match to count as a peer"
    )]
    pub peer_pattern: String,

    /// Exit instead of asking whether to retry after the scan attempts run out.
    #[arg(long = "no-prompt", env = "SURVEY_NO_PROMPT")]
    pub no_prompt: bool,

    /// Only record access points.
    #[arg(long = "skip-connection")]
    pub skip_connection: bool,
}
