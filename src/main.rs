//! # xmo
//!
//! Command-line client for the XMO management API found on Sagemcom-built
//! residential gateways. Logs in once, runs a chain of commands against the
//! configuration tree, then logs out.
//!
//! ```text
//! xmo -p secret get-wan-mode
//! xmo -p secret set-dns-servers -s 1.1.1.1 192.168.2.53 flush-log
//! xmo get-value --path Device/DeviceInfo/SoftwareVersion --path Device/DNS
//! ```
//!
//! ## Architecture
//!
//! ```text
//! main.rs          - entry point, tracing setup, login / run / logout
//! config.rs        - clap options, YAML file and env-var configuration
//! client.rs        - XMO session adapter (envelope, auth key, error mapping)
//! hash.rs          - MD5 / SHA-512 auth digests
//! keys.rs          - CamelCase -> snake_case key conversion for replies
//! terminal.rs      - stdout/stderr output and prompts (hidden password input)
//! validate.rs      - MAC, IPv4 and DNS server list validators
//! commands/
//!   mod.rs         - Command enum, Runner, flip-flop helper
//!   chain.rs       - splitting a chained command line per command
//!   dns.rs         - set-dns-servers
//!   wifi.rs        - disable-wifi-radios
//!   dmz.rs         - enable/disable-advanced-dmz
//! ```

mod client;
mod commands;
mod config;
mod hash;
mod keys;
mod terminal;
mod validate;

use clap::Parser;
use tracing::{info, warn};

use client::{ClientOptions, XmoClient};
use commands::{Command, CommandError, Runner};
use config::{Cli, Settings};
use terminal::{StdTerminal, Terminal};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // Parse the whole chain before logging in.
    let commands = match commands::parse_chain(&cli.commands) {
        Ok(c) => c,
        Err(e) => e.exit(),
    };

    let settings = match config::load_settings(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("xmo: configuration error: {}", e);
            std::process::exit(2);
        }
    };

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| settings.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(run(settings, &commands).await);
}

/// Log in, run the chain, log out. Returns the process exit code.
async fn run(settings: Settings, commands: &[Command]) -> i32 {
    let mut terminal = StdTerminal;

    let password = match settings.password {
        Some(p) => p,
        None => match terminal.prompt_hidden("Password") {
            Ok(p) => p,
            Err(e) => return abort(&mut terminal, &e.to_string()),
        },
    };

    let options = ClientOptions {
        host: settings.host,
        username: settings.username,
        password,
        auth_method: settings.auth_method,
        keep_keys: settings.keep_keys,
        insecure: settings.insecure,
    };
    info!(host = %options.host, auth_method = %options.auth_method, "connecting");

    let mut client = match XmoClient::new(options) {
        Ok(c) => c,
        Err(e) => return abort(&mut terminal, &e.to_string()),
    };
    if let Err(e) = client.login().await {
        return abort(&mut terminal, &e.to_string());
    }

    let result = Runner::new(&mut client, &mut terminal, &settings.defaults)
        .run_all(commands)
        .await;

    if let Err(e) = client.logout().await {
        warn!("logout failed: {e}");
    }

    exit_code(&mut terminal, result)
}

/// Report the chain's outcome and pick the exit code: 2 for usage errors,
/// 1 for anything else that failed.
fn exit_code<T: Terminal>(terminal: &mut T, result: Result<(), CommandError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) if e.exit_code() == 2 => {
            terminal.error(&format!("Error: {e}"));
            2
        }
        Err(e) => abort(terminal, &e.to_string()),
    }
}

fn abort<T: Terminal>(terminal: &mut T, message: &str) -> i32 {
    terminal.error(message);
    terminal.error("Aborted!");
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::terminal::testing::ScriptedTerminal;

    #[test]
    fn success_exits_zero_silently() {
        let mut term = ScriptedTerminal::default();
        assert_eq!(exit_code(&mut term, Ok(())), 0);
        assert!(term.stderr.is_empty());
    }

    #[test]
    fn usage_error_exits_two() {
        let mut term = ScriptedTerminal::default();
        let code = exit_code(&mut term, Err(CommandError::Usage("Invalid radio(s): GUEST".into())));
        assert_eq!(code, 2);
        assert_eq!(term.stderr, vec!["Error: Invalid radio(s): GUEST".to_string()]);
    }

    #[test]
    fn gateway_error_aborts_with_one() {
        let mut term = ScriptedTerminal::default();
        let err = CommandError::Gateway(ClientError::UnknownPath("Device/Nope".into()));
        let message = err.to_string();
        assert_eq!(exit_code(&mut term, Err(err)), 1);
        assert_eq!(term.stderr, vec![message, "Aborted!".to_string()]);
    }
}
