//! Provides a means to read, parse and hold configuration options for scans.
use clap::Parser;
use serde_derive::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Workers used when neither flag nor config sets them.
pub const DEFAULT_THREADS: usize = 10;
/// Per-probe timeout, in seconds, covering the whole exchange.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "webscan",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    disable_help_flag = true,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Bulk HTTP/HTTPS prober. Sends one GET to every address:port entry,
/// optionally once per virtual host, and appends every response as a JSON
/// line to the output file.
/// WARNING Only scan infrastructure you are authorised to test.
pub struct Opts {
    /// Newline-delimited file of address:port entries. Only ports 80 and 443 are probed.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Newline-delimited file of hostnames sent as the Host header.
    #[arg(short = 'h', long)]
    pub hosts: Option<PathBuf>,

    /// Output file. Created if missing, appended to otherwise.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of concurrent workers.
    #[arg(short, long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// The timeout in seconds for a whole probe, body included.
    #[arg(short = 'w', long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Print one line per probe with its status code or error.
    #[arg(short, long)]
    pub verbose: bool,

    /// Zip the output file once the scan is done. The original is kept.
    #[arg(short, long)]
    pub compress: bool,

    /// When a host list is given, do not also probe each address with itself as Host.
    #[arg(long)]
    pub skip_bare: bool,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,

    /// Whether to ignore the configuration file or not.
    #[arg(long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Hide the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    pub help: Option<bool>,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    /// Parses the command line arguments.
    pub fn read() -> Self {
        Self::parse()
    }

    /// Reads the command line arguments into an Opts struct and merge
    /// values found within the user configuration file.
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

        merge_required!(threads, timeout, verbose, compress, skip_bare, accessible);
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(input, hosts, output, ulimit);
    }

    /// `timeout` as a [`Duration`].
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            input: None,
            hosts: None,
            output: None,
            threads: DEFAULT_THREADS,
            timeout: DEFAULT_TIMEOUT_SECS,
            verbose: false,
            compress: false,
            skip_bare: false,
            ulimit: None,
            no_config: true,
            config_path: None,
            no_banner: false,
            accessible: false,
            help: None,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Deserialize)]
pub struct Config {
    input: Option<PathBuf>,
    hosts: Option<PathBuf>,
    output: Option<PathBuf>,
    threads: Option<usize>,
    timeout: Option<u64>,
    verbose: Option<bool>,
    compress: Option<bool>,
    skip_bare: Option<bool>,
    ulimit: Option<u64>,
    accessible: Option<bool>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing file yields an empty configuration.
    ///
    /// # Format
    ///
    /// hosts = "/srv/lists/vhosts.txt"
    /// threads = 50
    /// timeout = 10
    /// verbose = true
    /// skip_bare = false
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = match custom_config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let content = if config_path.exists() {
            fs::read_to_string(&config_path).unwrap_or_default()
        } else {
            String::new()
        };

        toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Found {e} in configuration file {}", config_path.display())
        })
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let Some(mut config_path) = dirs::home_dir() else {
        anyhow::bail!("Could not infer config file path.");
    };
    config_path.push(".webscan.toml");
    Ok(config_path)
}
