//! Command-line options and configuration loading for xmo.
//!
//! Each global option is resolved from (highest wins):
//!
//! 1. **Command-line flag**: `--host`, `--username`, ...
//! 2. **Environment variable**: `XMO_HOST`, `XMO_USERNAME`, `XMO_PASSWORD`,
//!    `XMO_AUTH_METHOD`
//! 3. **YAML file**: `--config <path>`, else `XMO_CONFIG`, else
//!    `config.yaml` in the working directory when present
//! 4. **Compiled defaults**: `192.168.2.1`, `admin`, `sha512`
//!
//! The YAML file can also carry per-command defaults, keyed by command name:
//!
//! ```yaml
//! host: 192.168.2.1
//! username: admin
//! password: secret
//! auth_method: sha512
//! keep_keys: false
//! insecure: false
//! logging:
//!   level: warn
//! set-dns-servers:
//!   dns_servers: [1.1.1.1, 8.8.8.8]
//! disable-wifi-radios:
//!   radios: [RADIO5G]
//! enable-advanced-dmz:
//!   mac_address: "aa:bb:cc:dd:ee:ff"
//! ```

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::hash::AuthMethod;
use crate::validate;

const DEFAULT_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 2, 1);
const DEFAULT_USERNAME: &str = "admin";
const IMPLICIT_CONFIG: &str = "config.yaml";

const COMMANDS_HELP: &str = "\
Commands (several may be chained, each followed by its own options):
  get-value             Print the value at one or more paths as JSON
  set-value             Set the value at a path
  get-onu-mode          Print the optical ONU mode
  get-wan-mode          Print the WAN mode
  get-dns               Print the DNS configuration
  set-dns-servers       Point the static DNS forwardings at new servers
  disable-wifi-radios   Disable one or more active Wi-Fi radios
  enable-advanced-dmz   Expose a LAN host through the advanced DMZ
  disable-advanced-dmz  Turn the advanced DMZ off
  flush-log             Flush the device log

Run `xmo <COMMAND> --help` for a command's options.";

/// CLI arguments parsed by `clap`.
#[derive(Parser, Debug)]
#[command(
    name = "xmo",
    version,
    about = "Configure an XMO residential gateway from the command line",
    after_help = COMMANDS_HELP
)]
pub struct Cli {
    /// Gateway IPv4 address [default: 192.168.2.1]
    #[arg(short = 'H', long)]
    pub host: Option<Ipv4Addr>,

    /// Administrator username [default: admin]
    #[arg(short, long)]
    pub username: Option<String>,

    /// Administrator password (prompted when not given)
    #[arg(short, long)]
    pub password: Option<String>,

    /// Authentication method [default: sha512]
    #[arg(short, long, value_enum, ignore_case = true)]
    pub auth_method: Option<AuthMethod>,

    /// Path to a YAML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print keys exactly as the gateway sends them
    #[arg(long)]
    pub keep_keys: bool,

    /// Accept self-signed TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Commands to run, in order
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub commands: Vec<String>,
}

/// Raw YAML config file structure.
#[derive(Deserialize, Default, Debug)]
pub struct FileConfig {
    pub host: Option<Ipv4Addr>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_method: Option<AuthMethod>,
    pub keep_keys: Option<bool>,
    pub insecure: Option<bool>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default, rename = "get-value", alias = "get_value")]
    pub get_value: PathSection,
    #[serde(default, rename = "set-dns-servers", alias = "set_dns_servers")]
    pub set_dns_servers: DnsSection,
    #[serde(default, rename = "disable-wifi-radios", alias = "disable_wifi_radios")]
    pub disable_wifi_radios: RadioSection,
    #[serde(default, rename = "enable-advanced-dmz", alias = "enable_advanced_dmz")]
    pub enable_advanced_dmz: DmzSection,
}

/// Logging configuration.
#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    /// tracing filter level (default `warn`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// A YAML value given either as a list or as one space-separated string.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Words {
    List(Vec<String>),
    Line(String),
}

impl Default for Words {
    fn default() -> Self {
        Words::List(Vec::new())
    }
}

impl Words {
    fn into_vec(self) -> Vec<String> {
        match self {
            Words::List(items) => items,
            Words::Line(line) => line.split_whitespace().map(String::from).collect(),
        }
    }
}

#[derive(Deserialize, Default, Debug)]
pub struct PathSection {
    #[serde(default, alias = "paths")]
    pub path: Vec<String>,
}

#[derive(Deserialize, Default, Debug)]
pub struct DnsSection {
    #[serde(default)]
    pub dns_servers: Option<Words>,
}

#[derive(Deserialize, Default, Debug)]
pub struct RadioSection {
    #[serde(default, alias = "radio")]
    pub radios: Words,
}

#[derive(Deserialize, Default, Debug)]
pub struct DmzSection {
    pub mac_address: Option<String>,
}

/// Defaults for command options, taken from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandDefaults {
    pub paths: Vec<String>,
    pub dns_servers: Vec<Ipv4Addr>,
    pub radios: Vec<String>,
    pub mac_address: Option<String>,
}

/// Validated settings ready for the session and the commands.
#[derive(Debug)]
pub struct Settings {
    pub host: Ipv4Addr,
    pub username: String,
    /// `None` means the user is prompted.
    pub password: Option<String>,
    pub auth_method: AuthMethod,
    pub keep_keys: bool,
    pub insecure: bool,
    pub log_level: String,
    pub defaults: CommandDefaults,
}

/// Load the config file (if any) and merge it with flags and environment.
pub fn load_settings(cli: &Cli) -> Result<Settings, String> {
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
    let file = match locate_config(cli, &env) {
        Some(path) => load_file(&path)?,
        None => FileConfig::default(),
    };
    resolve(cli, file, &env)
}

/// Pick the config file: explicit flag, then `XMO_CONFIG`, then `./config.yaml`.
fn locate_config(cli: &Cli, env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(path) = &cli.config {
        return Some(expand_tilde(path));
    }
    if let Some(path) = env("XMO_CONFIG") {
        return Some(expand_tilde(Path::new(&path)));
    }
    let implicit = PathBuf::from(IMPLICIT_CONFIG);
    implicit.is_file().then_some(implicit)
}

/// Expand a leading `~` to `$HOME`.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

fn load_file(path: &Path) -> Result<FileConfig, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
    parse_file(&contents).map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))
}

fn parse_file(contents: &str) -> Result<FileConfig, serde_yaml::Error> {
    // An empty file deserializes to unit, not to an empty mapping.
    if contents.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(contents)
}

/// Merge flags, environment and file into [`Settings`].
fn resolve(
    cli: &Cli,
    file: FileConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Settings, String> {
    let env_host = env("XMO_HOST")
        .map(|v| {
            v.parse::<Ipv4Addr>()
                .map_err(|_| format!("XMO_HOST '{v}' is not an IPv4 address"))
        })
        .transpose()?;
    let env_method = env("XMO_AUTH_METHOD")
        .map(|v| v.parse::<AuthMethod>())
        .transpose()?;

    let host = cli.host.or(env_host).or(file.host).unwrap_or(DEFAULT_HOST);
    let username = cli
        .username
        .clone()
        .or_else(|| env("XMO_USERNAME"))
        .or(file.username)
        .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
    let password = cli
        .password
        .clone()
        .or_else(|| env("XMO_PASSWORD"))
        .or(file.password);
    let auth_method = cli
        .auth_method
        .or(env_method)
        .or(file.auth_method)
        .unwrap_or_default();

    let dns_servers = match file.set_dns_servers.dns_servers {
        Some(words) => validate::dns_servers(&words.into_vec().join(" "))
            .map_err(|e| format!("set-dns-servers.dns_servers: {e}"))?,
        None => Vec::new(),
    };
    let mac_address = file
        .enable_advanced_dmz
        .mac_address
        .as_deref()
        .map(validate::mac_address)
        .transpose()
        .map_err(|e| format!("enable-advanced-dmz.mac_address: {e}"))?;

    Ok(Settings {
        host,
        username,
        password,
        auth_method,
        keep_keys: cli.keep_keys || file.keep_keys.unwrap_or(false),
        insecure: cli.insecure || file.insecure.unwrap_or(false),
        log_level: file.logging.level,
        defaults: CommandDefaults {
            paths: file.get_value.path,
            dns_servers,
            radios: file.disable_wifi_radios.radios.into_vec(),
            mac_address,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("xmo").chain(args.iter().copied())).unwrap()
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn compiled_defaults() {
        let s = resolve(&cli(&["get-wan-mode"]), FileConfig::default(), &env_from(&[])).unwrap();
        assert_eq!(s.host, Ipv4Addr::new(192, 168, 2, 1));
        assert_eq!(s.username, "admin");
        assert_eq!(s.password, None);
        assert_eq!(s.auth_method, AuthMethod::Sha512);
        assert_eq!(s.log_level, "warn");
        assert!(!s.keep_keys);
        assert_eq!(s.defaults, CommandDefaults::default());
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let file = parse_file("host: 10.0.0.1\nusername: file-user\npassword: file-pass\n").unwrap();
        let env = env_from(&[("XMO_HOST", "10.0.0.2"), ("XMO_PASSWORD", "env-pass")]);
        let s = resolve(&cli(&["-H", "10.0.0.3", "get-dns"]), file, &env).unwrap();
        assert_eq!(s.host, Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(s.username, "file-user");
        assert_eq!(s.password.as_deref(), Some("env-pass"));
    }

    #[test]
    fn bad_env_host_is_an_error() {
        let env = env_from(&[("XMO_HOST", "gateway.lan")]);
        let err = resolve(&cli(&["get-dns"]), FileConfig::default(), &env).unwrap_err();
        assert!(err.contains("XMO_HOST"));
    }

    #[test]
    fn auth_method_flag_ignores_case() {
        let s = resolve(
            &cli(&["-a", "MD5", "flush-log"]),
            FileConfig::default(),
            &env_from(&[]),
        )
        .unwrap();
        assert_eq!(s.auth_method, AuthMethod::Md5);
    }

    #[test]
    fn globals_stop_at_first_command() {
        let c = cli(&["-p", "pw", "get-value", "--path", "Device/DNS", "flush-log"]);
        assert_eq!(c.password.as_deref(), Some("pw"));
        assert_eq!(c.commands, vec!["get-value", "--path", "Device/DNS", "flush-log"]);
    }

    #[test]
    fn command_sections_supply_defaults() {
        let yaml = "\
auth_method: MD5
logging:
  level: debug
get-value:
  path: [Device/DeviceInfo/SoftwareVersion]
set_dns_servers:
  dns_servers: 1.1.1.1 8.8.8.8
disable-wifi-radios:
  radios: [RADIO5G]
enable-advanced-dmz:
  mac_address: aa:bb:cc:dd:ee:ff
";
        let file = parse_file(yaml).unwrap();
        let s = resolve(&cli(&["get-dns"]), file, &env_from(&[])).unwrap();
        assert_eq!(s.auth_method, AuthMethod::Md5);
        assert_eq!(s.log_level, "debug");
        assert_eq!(s.defaults.paths, vec!["Device/DeviceInfo/SoftwareVersion"]);
        assert_eq!(
            s.defaults.dns_servers,
            vec![Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(8, 8, 8, 8)]
        );
        assert_eq!(s.defaults.radios, vec!["RADIO5G"]);
        assert_eq!(s.defaults.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn invalid_mac_in_file_is_rejected() {
        let file = parse_file("enable-advanced-dmz:\n  mac_address: not-a-mac\n").unwrap();
        let err = resolve(&cli(&["get-dns"]), file, &env_from(&[])).unwrap_err();
        assert!(err.contains("Invalid MAC address"));
    }

    #[test]
    fn empty_file_is_default() {
        let file = parse_file("  \n").unwrap();
        assert!(file.host.is_none());
        assert_eq!(file.logging.level, "warn");
    }

    #[test]
    fn explicit_config_path_wins() {
        let c = cli(&["--config", "/etc/xmo.yaml", "get-dns"]);
        let env = env_from(&[("XMO_CONFIG", "/tmp/other.yaml")]);
        assert_eq!(locate_config(&c, &env), Some(PathBuf::from("/etc/xmo.yaml")));

        let c = cli(&["get-dns"]);
        assert_eq!(locate_config(&c, &env), Some(PathBuf::from("/tmp/other.yaml")));
    }
}
