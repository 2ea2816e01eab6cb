//! Provides a means to read, parse and hold configuration options for scans.
use crate::address::{parse_target, TargetSpec};
use crate::error::InputError;
use clap::Parser;
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const LOWEST_PORT_NUMBER: u16 = 1;

/// Port Minecraft servers listen on unless told otherwise.
pub const DEFAULT_PORT: u16 = 25565;

pub type Ports = Vec<u16>;
pub type Targets = Vec<TargetSpec>;

/// Parses a comma-delimited list of addresses, CIDRs and ranges.
pub fn parse_targets(input: &str) -> Result<Targets, InputError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(parse_target)
        .collect::<Result<Targets, _>>()
        .and_then(|targets| {
            if targets.is_empty() {
                Err(InputError::InvalidTarget(input.to_owned()))
            } else {
                Ok(targets)
            }
        })
}

/// Parses `25565`, `25565,25570` or `25560-25570,19132` into a sorted,
/// de-duplicated port list.
pub fn parse_ports_and_ranges(input: &str) -> Result<Ports, InputError> {
    let mut ports = Vec::new();

    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_single_port(start.trim(), part)?;
                let end = parse_single_port(end.trim(), part)?;
                if start > end {
                    return Err(InputError::ReversedRange {
                        start: start.to_string(),
                        end: end.to_string(),
                        range: part.to_owned(),
                    });
                }
                ports.extend(start..=end);
            }
            None => ports.push(parse_single_port(part, part)?),
        }
    }

    if ports.is_empty() {
        return Err(InputError::NoPorts);
    }

    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

/// `part` is the surrounding comma-separated entry, used for range errors.
fn parse_single_port(port: &str, part: &str) -> Result<u16, InputError> {
    if port.contains('-') {
        return Err(InputError::RangeFormat(part.to_owned()));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| InputError::InvalidPort(port.to_owned()))?;
    if port < LOWEST_PORT_NUMBER {
        return Err(InputError::PortOutOfRange(port));
    }
    Ok(port)
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "conduit",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nARGS:\n{positionals}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// A fast Minecraft server scanner.
/// Pings every address and port with Server List Ping, optionally falling
/// back to Query over UDP.
pub struct Opts {
    /// Comma-delimited addresses, CIDRs or ranges. Examples: 10.0.0.1, 10.0.0.0/24, 10.0.0.1-10.0.0.50, 10.0.0.1-50
    #[arg(value_parser = parse_targets)]
    pub targets: Targets,

    /// Ports and/or port ranges to scan. Examples: 25565 or 25565,25570-25580 [default: 25565]
    #[arg(value_parser = parse_ports_and_ranges)]
    pub ports: Option<Ports>,

    /// The timeout in milliseconds applied to each connect, write and read.
    #[arg(short, long, default_value = "500")]
    pub timeout: u32,

    /// How many targets are probed at the same time.
    #[arg(short, long, default_value = "254")]
    pub size: u16,

    /// Fall back to the Query protocol over UDP when Server List Ping fails.
    #[arg(short, long)]
    pub query: bool,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Hide the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Custom path to config file
    #[arg(short, long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. Only output the servers found, one per line.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,
}

impl Opts {
    pub fn read() -> Self {
        Self::parse()
    }

    /// Merges values found within the user configuration file, unless
    /// `--no-config` was given.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(timeout, size, query, greppable, accessible);
    }

    fn merge_optional(&mut self, config: &Config) {
        // Ports given on the command line win over the config file.
        if self.ports.is_none() {
            self.ports.clone_from(&config.ports);
        }
        if config.ulimit.is_some() {
            self.ulimit = config.ulimit;
        }
    }

    /// The ports to scan, falling back to the default Minecraft port.
    pub fn ports(&self) -> Ports {
        self.ports.clone().unwrap_or_else(|| vec![DEFAULT_PORT])
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout))
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    ports: Option<Vec<u16>>,
    timeout: Option<u32>,
    size: Option<u16>,
    query: Option<bool>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    ulimit: Option<u64>,
}

impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing file is an empty config.
    ///
    /// # Format
    ///
    /// ports = [25565, 25566]
    /// timeout = 750
    /// size = 512
    /// query = true
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let Some(config_path) = custom_config_path.or_else(default_config_path) else {
            return Ok(Self::default());
        };
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("{} in {}", e, config_path.display()))
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".conduit.toml");
    Some(config_path)
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use parameterized::parameterized;

    use super::{parse_ports_and_ranges, parse_targets, Config, InputError, Opts, DEFAULT_PORT};

    fn config() -> Config {
        Config::parse(
            r"
            ports = [25565, 25566]
            timeout = 1000
            size = 16
            query = true
            greppable = true
            ulimit = 4096
            ",
        )
        .unwrap()
    }

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[test]
    fn cli_defaults() {
        let opts = Opts::parse_from(["conduit", "127.0.0.1"]);
        assert_eq!(opts.targets.len(), 1);
        assert_eq!(opts.ports(), vec![DEFAULT_PORT]);
        assert_eq!(opts.timeout, 500);
        assert_eq!(opts.size, 254);
        assert!(!opts.query);
    }

    #[parameterized(input = {
        vec!["conduit", "10.0.0.0/24", "25565-25567", "--query"],
        vec!["conduit", "10.0.0.1,10.0.0.2", "25565,25570", "-q", "-t", "250"],
        vec!["conduit", "-s", "10", "10.0.0.1-20", "19132"],
    }, ports = {
        vec![25565, 25566, 25567],
        vec![25565, 25570],
        vec![19132],
    })]
    fn parse_positional_arguments(input: Vec<&str>, ports: Vec<u16>) {
        let opts = Opts::parse_from(input);
        assert_eq!(opts.ports(), ports);
    }

    #[test]
    fn rejects_bad_target_and_port_specs() {
        assert!(Opts::try_parse_from(["conduit", "not-an-ip"]).is_err());
        assert!(Opts::try_parse_from(["conduit", "127.0.0.1", "0"]).is_err());
        assert!(Opts::try_parse_from(["conduit"]).is_err());
    }

    #[test]
    fn opts_no_merge_when_config_is_ignored() {
        let mut opts = Opts::parse_from(["conduit", "127.0.0.1", "--no-config"]);
        opts.merge(&config());

        assert_eq!(opts.timeout, 500);
        assert!(!opts.query);
        assert_eq!(opts.ports(), vec![DEFAULT_PORT]);
    }

    #[test]
    fn opts_merge_config_values() {
        let mut opts = Opts::parse_from(["conduit", "127.0.0.1"]);
        opts.merge(&config());

        assert_eq!(opts.timeout, 1000);
        assert_eq!(opts.size, 16);
        assert!(opts.query);
        assert!(opts.greppable);
        assert_eq!(opts.ulimit, Some(4096));
        assert_eq!(opts.ports(), vec![25565, 25566]);
    }

    #[test]
    fn command_line_ports_beat_config_ports() {
        let mut opts = Opts::parse_from(["conduit", "127.0.0.1", "19132"]);
        opts.merge(&config());
        assert_eq!(opts.ports(), vec![19132]);
    }

    #[test]
    fn config_rejects_wrong_types() {
        assert!(Config::parse("timeout = \"fast\"").is_err());
    }

    #[test]
    fn parse_target_lists() {
        assert_eq!(parse_targets("127.0.0.1, 10.0.0.0/30").unwrap().len(), 2);
        assert!(parse_targets(",").is_err());
        assert!(parse_targets("127.0.0.1,nope").is_err());
    }

    #[test]
    fn test_parse_ports_and_ranges_single_port() {
        assert_eq!(parse_ports_and_ranges("25565"), Ok(vec![25565]));
    }

    #[test]
    fn test_parse_ports_and_ranges_mixed_ports_and_ranges() {
        assert_eq!(
            parse_ports_and_ranges("25570, 25565-25567 ,80"),
            Ok(vec![80, 25565, 25566, 25567, 25570])
        );
    }

    #[test]
    fn test_parse_ports_and_ranges_duplicates() {
        assert_eq!(parse_ports_and_ranges("25565,25565-25566"), Ok(vec![25565, 25566]));
    }

    #[parameterized(input = {
        "", ",", "abc", "0", "70000", "1-2-3", "5-1", "1-abc"
    }, expected = {
        InputError::NoPorts,
        InputError::NoPorts,
        InputError::InvalidPort("abc".to_owned()),
        InputError::PortOutOfRange(0),
        InputError::InvalidPort("70000".to_owned()),
        InputError::RangeFormat("1-2-3".to_owned()),
        InputError::ReversedRange { start: "5".to_owned(), end: "1".to_owned(), range: "5-1".to_owned() },
        InputError::InvalidPort("abc".to_owned()),
    })]
    fn test_parse_ports_and_ranges_errors(input: &str, expected: InputError) {
        assert_eq!(parse_ports_and_ranges(input), Err(expected));
    }
}
