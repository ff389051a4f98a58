//! Splitting a chained command line into one argument list per command.
//!
//! `xmo -p pw get-value --path A --path B flush-log` runs two commands. clap
//! parses the global options; everything after them lands here and is cut at
//! each command name, unless the name is the value of the preceding option
//! (`--path get-dns` reads the path `get-dns`). Only options the current
//! command declares as value-taking count, so `--value -5 get-dns` splits.

use clap::error::ErrorKind;
use clap::{Arg, CommandFactory, Parser};

use super::Command;
use crate::validate;

#[derive(Parser, Debug)]
#[command(name = "xmo", no_binary_name = true)]
struct Step {
    #[command(subcommand)]
    command: Command,
}

/// Parse and check every command segment. Fails on the first segment
/// rejected, so nothing runs when any part of the chain is invalid.
pub fn parse_chain(args: &[String]) -> Result<Vec<Command>, clap::Error> {
    let mut root = Step::command();
    let commands = split_chain(args, &root)
        .into_iter()
        .map(|segment| Step::try_parse_from(segment).map(|step| step.command))
        .collect::<Result<Vec<_>, _>>()?;
    commands
        .into_iter()
        .map(|command| normalize(command).map_err(|msg| root.error(ErrorKind::ValueValidation, msg)))
        .collect()
}

/// Checks clap cannot express per occurrence: `-s` may repeat, but the
/// servers across all occurrences are deduplicated and capped at two.
fn normalize(command: Command) -> Result<Command, String> {
    match command {
        Command::SetDnsServers { dns_servers } if !dns_servers.is_empty() => {
            Ok(Command::SetDnsServers {
                dns_servers: validate::dedup_servers(&dns_servers)?,
            })
        }
        other => Ok(other),
    }
}

fn split_chain(args: &[String], root: &clap::Command) -> Vec<Vec<String>> {
    let mut segments: Vec<Vec<String>> = Vec::new();
    for arg in args {
        let starts_command = root.find_subcommand(arg).is_some()
            && segments.last().map_or(true, |seg| match seg.last() {
                Some(prev) => !takes_value(root, &seg[0], prev),
                None => true,
            });
        match segments.last_mut() {
            Some(segment) if !starts_command => segment.push(arg.clone()),
            _ => segments.push(vec![arg.clone()]),
        }
    }
    segments
}

/// Whether `token` is an option of subcommand `name` that reads its value
/// from the next token. `--path=x` and option values such as `-5` do not.
fn takes_value(root: &clap::Command, name: &str, token: &str) -> bool {
    if token.contains('=') {
        return false;
    }
    root.find_subcommand(name)
        .and_then(|sub| sub.get_arguments().find(|arg| names_option(arg, token)))
        .map_or(false, |arg| arg.get_action().takes_values())
}

fn names_option(arg: &Arg, token: &str) -> bool {
    if let Some(long) = token.strip_prefix("--") {
        arg.get_long() == Some(long)
            || arg
                .get_aliases()
                .map_or(false, |aliases| aliases.contains(&long))
    } else if let Some(short) = token.strip_prefix('-') {
        let mut chars = short.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => arg.get_short() == Some(c),
            _ => false,
        }
    } else {
        false
    }
}
