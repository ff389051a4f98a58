//! The commands xmo can run against a logged-in gateway session.
//!
//! Each command is a short, fixed sequence of get/set calls. [`Runner`]
//! executes a chain of them in order and stops at the first one that aborts.
//!
//! ## Failure model
//!
//! - `get-value` reports a failing path on stderr and carries on with the
//!   next path; it never aborts the chain.
//! - Any other gateway error aborts (exit 1).
//! - Bad user input aborts with a usage error (exit 2).

mod chain;
mod dmz;
mod dns;
mod wifi;

#[cfg(test)]
mod fake;

use std::io;
use std::net::Ipv4Addr;

use clap::Subcommand;
use serde_json::Value;
use tracing::info;

use crate::client::{ClientError, Gateway, SetValue};
use crate::config::CommandDefaults;
use crate::terminal::Terminal;
use crate::validate;

pub use chain::parse_chain;

const ONU_MODE: &str = "Device/Optical/G988/OnuMode";
const WAN_MODE: &str = "Device/Services/BellNetworkCfg/WanMode";
const DNS: &str = "Device/DNS";
const FLUSH_DEVICE_LOG: &str = "Device/DeviceInfo/FlushDeviceLog";

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the value at one or more paths as JSON
    GetValue {
        /// XPath to read; repeat for several paths
        #[arg(long = "path", value_name = "XPATH")]
        paths: Vec<String>,
    },
    /// Set the value at a path
    SetValue {
        /// XPath to write
        #[arg(long, value_name = "XPATH")]
        path: String,
        /// New value, sent as a string
        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },
    /// Print the optical ONU mode
    GetOnuMode,
    /// Print the WAN mode
    GetWanMode,
    /// Print the DNS configuration
    GetDns,
    /// Point the static DNS forwardings at new servers
    SetDnsServers {
        /// One or two IPv4 resolvers (prompted when not given)
        #[arg(short = 's', long, num_args = 1..=2, value_name = "IPV4")]
        dns_servers: Vec<Ipv4Addr>,
    },
    /// Disable one or more active Wi-Fi radios
    DisableWifiRadios {
        /// Radio alias, e.g. RADIO5G; repeatable (prompted when not given)
        #[arg(short, long = "radios", alias = "radio", value_name = "ALIAS")]
        radios: Vec<String>,
    },
    /// Expose a LAN host through the advanced DMZ
    EnableAdvancedDmz {
        /// MAC address of the DMZ host (prompted when not given)
        #[arg(short, long, value_parser = validate::mac_address)]
        mac_address: Option<String>,
    },
    /// Turn the advanced DMZ off
    DisableAdvancedDmz,
    /// Flush the device log
    FlushLog,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetValue { .. } => "get-value",
            Command::SetValue { .. } => "set-value",
            Command::GetOnuMode => "get-onu-mode",
            Command::GetWanMode => "get-wan-mode",
            Command::GetDns => "get-dns",
            Command::SetDnsServers { .. } => "set-dns-servers",
            Command::DisableWifiRadios { .. } => "disable-wifi-radios",
            Command::EnableAdvancedDmz { .. } => "enable-advanced-dmz",
            Command::DisableAdvancedDmz => "disable-advanced-dmz",
            Command::FlushLog => "flush-log",
        }
    }
}

/// Errors that abort a command chain.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Invalid or missing user input.
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Gateway(#[from] ClientError),

    /// The gateway answered with a value of an unexpected shape.
    #[error("unexpected value at {xpath}: {reason}")]
    Unexpected { xpath: String, reason: String },

    #[error("prompt failed: {0}")]
    Prompt(#[from] io::Error),
}

impl CommandError {
    /// Process exit code: 2 for usage errors, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Usage(_) => 2,
            _ => 1,
        }
    }
}

/// Runs commands against one gateway session.
pub struct Runner<'a, G, T> {
    gateway: &'a mut G,
    terminal: &'a mut T,
    defaults: &'a CommandDefaults,
}

impl<'a, G: Gateway, T: Terminal> Runner<'a, G, T> {
    pub fn new(gateway: &'a mut G, terminal: &'a mut T, defaults: &'a CommandDefaults) -> Self {
        Self {
            gateway,
            terminal,
            defaults,
        }
    }

    /// Run `commands` in order, stopping at the first error.
    pub async fn run_all(&mut self, commands: &[Command]) -> Result<(), CommandError> {
        for command in commands {
            self.run(command).await?;
        }
        Ok(())
    }

    pub async fn run(&mut self, command: &Command) -> Result<(), CommandError> {
        info!(command = command.name(), "running command");
        let defaults = self.defaults;
        match command {
            Command::GetValue { paths } => {
                let paths = if paths.is_empty() {
                    &defaults.paths
                } else {
                    paths
                };
                if paths.is_empty() {
                    return Err(CommandError::Usage("Missing option '--path'.".into()));
                }
                self.get_values(paths).await;
                Ok(())
            }
            Command::SetValue { path, value } => {
                self.gateway
                    .set_value(path, SetValue::Text(value.clone()))
                    .await?;
                Ok(())
            }
            Command::GetOnuMode => {
                self.get_values(&[ONU_MODE.to_string()]).await;
                Ok(())
            }
            Command::GetWanMode => {
                self.get_values(&[WAN_MODE.to_string()]).await;
                Ok(())
            }
            Command::GetDns => {
                self.get_values(&[DNS.to_string()]).await;
                Ok(())
            }
            Command::SetDnsServers { dns_servers } => {
                let servers = if !dns_servers.is_empty() {
                    validate::dedup_servers(dns_servers).map_err(CommandError::Usage)?
                } else if !defaults.dns_servers.is_empty() {
                    defaults.dns_servers.clone()
                } else {
                    let answer = self.terminal.prompt("DNS servers separated by a space")?;
                    validate::dns_servers(&answer).map_err(CommandError::Usage)?
                };
                dns::set_dns_servers(self.gateway, &servers).await
            }
            Command::DisableWifiRadios { radios } => {
                let radios = if radios.is_empty() {
                    &defaults.radios
                } else {
                    radios
                };
                wifi::disable_wifi_radios(self.gateway, self.terminal, radios).await
            }
            Command::EnableAdvancedDmz { mac_address } => {
                let mac = match mac_address.as_ref().or(defaults.mac_address.as_ref()) {
                    Some(mac) => mac.clone(),
                    None => {
                        let answer = self.terminal.prompt("MAC Address")?;
                        validate::mac_address(&answer).map_err(CommandError::Usage)?
                    }
                };
                dmz::enable_advanced_dmz(self.gateway, &mac).await?;
                Ok(())
            }
            Command::DisableAdvancedDmz => {
                dmz::disable_advanced_dmz(self.gateway).await?;
                Ok(())
            }
            Command::FlushLog => {
                flipflop(self.gateway, FLUSH_DEVICE_LOG, Vec::new()).await?;
                Ok(())
            }
        }
    }

    /// Print each path's value; report failures without aborting.
    async fn get_values(&mut self, paths: &[String]) {
        for path in paths {
            match self.gateway.get_value(path).await {
                Ok(value) => self.terminal.print(&pretty(&value)),
                Err(e) => self.terminal.error(&e.to_string()),
            }
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Clear `flag`, apply `updates` in order, then set `flag` again.
///
/// The flag is set back even when an update fails; the first error is returned.
pub async fn flipflop<G: Gateway>(
    gateway: &mut G,
    flag: &str,
    updates: Vec<(String, SetValue)>,
) -> Result<(), ClientError> {
    gateway.set_value(flag, false.into()).await?;
    let mut outcome = Ok(());
    for (xpath, value) in updates {
        if let Err(e) = gateway.set_value(&xpath, value).await {
            outcome = Err(e);
            break;
        }
    }
    let restored = gateway.set_value(flag, true.into()).await;
    outcome.and(restored)
}
