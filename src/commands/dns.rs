//! `set-dns-servers`: replace the ISP-provided resolvers with static ones.
//!
//! The gateway keeps one forwarding entry per resolver under
//! `Device/DNS/Relay/Forwardings`. Entries learned over IPCP on the data
//! interface are switched off; the pre-provisioned `STATIC*` entries are
//! pointed at the requested servers and switched on.

use std::net::Ipv4Addr;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::CommandError;
use crate::client::Gateway;
use crate::validate;

pub(crate) const FORWARDINGS: &str = "Device/DNS/Relay/Forwardings";
const LAN_INTERFACE: &str = "Device/IP/Interfaces/Interface[IP_BR_LAN]";
const DATA_INTERFACE: &str = "Device/IP/Interfaces/Interface[IP_DATA]";

/// One DNS relay rule.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Forwarding {
    pub uid: u64,
    #[serde(alias = "Alias")]
    pub alias: String,
    #[serde(alias = "Interface")]
    pub interface: String,
    #[serde(default, alias = "Enable")]
    pub enable: Option<bool>,
}

impl Forwarding {
    /// Learned from the ISP and currently in use.
    fn is_automatic(&self) -> bool {
        self.alias.starts_with("IPCP")
            && self.interface.ends_with("[IP_DATA]")
            && self.enable == Some(true)
    }

    fn is_static(&self) -> bool {
        self.alias.starts_with("STATIC")
            && (self.interface.ends_with("[IP_DATA]") || self.interface.ends_with("[IP_BR_LAN]"))
    }
}

/// Updates derived from the current forwardings and the requested servers.
#[derive(Debug, PartialEq, Eq)]
pub struct Plan {
    pub disable: Vec<u64>,
    pub assign: Vec<(u64, Ipv4Addr)>,
}

pub(crate) fn forwarding_xpath(uid: u64, leaf: &str) -> String {
    format!("{FORWARDINGS}/Forwarding[@uid={uid}]/{leaf}")
}

/// Decode the forwarding list, skipping records that lack a required key.
pub fn parse_forwardings(value: &Value) -> Result<Vec<Forwarding>, CommandError> {
    let items = value.as_array().ok_or_else(|| CommandError::Unexpected {
        xpath: FORWARDINGS.to_string(),
        reason: "expected a list of forwardings".to_string(),
    })?;
    Ok(items
        .iter()
        .filter_map(|item| match Forwarding::deserialize(item) {
            Ok(f) => Some(f),
            Err(e) => {
                debug!("skipping forwarding record: {e}");
                None
            }
        })
        .collect())
}

/// Pair static entries with servers in order; every active IPCP entry is disabled.
pub fn plan(forwardings: &[Forwarding], servers: &[Ipv4Addr]) -> Plan {
    let mut disable: Vec<u64> = Vec::new();
    let mut statics: Vec<u64> = Vec::new();
    for f in forwardings {
        if f.is_automatic() && !disable.contains(&f.uid) {
            disable.push(f.uid);
        }
        if f.is_static() && !statics.contains(&f.uid) {
            statics.push(f.uid);
        }
    }

    if statics.len() < servers.len() {
        warn!(
            "only {} static forwarding(s) available, ignoring {} server(s)",
            statics.len(),
            servers.len() - statics.len()
        );
    } else if statics.len() > servers.len() {
        warn!(
            "{} static forwarding(s) left unassigned: {:?}",
            statics.len() - servers.len(),
            &statics[servers.len()..]
        );
    }

    let assign = statics.into_iter().zip(servers.iter().copied()).collect();
    Plan { disable, assign }
}

pub async fn set_dns_servers<G: Gateway>(
    gateway: &mut G,
    servers: &[Ipv4Addr],
) -> Result<(), CommandError> {
    let value = gateway.get_value(FORWARDINGS).await?;
    let plan = plan(&parse_forwardings(&value)?, servers);

    for uid in &plan.disable {
        gateway
            .set_value(&forwarding_xpath(*uid, "Enable"), false.into())
            .await?;
    }
    for (uid, server) in &plan.assign {
        let interface = if validate::is_private(*server) {
            LAN_INTERFACE
        } else {
            DATA_INTERFACE
        };
        gateway
            .set_value(&forwarding_xpath(*uid, "DNSServer"), (*server).into())
            .await?;
        gateway
            .set_value(&forwarding_xpath(*uid, "Interface"), interface.into())
            .await?;
        gateway
            .set_value(&forwarding_xpath(*uid, "Enable"), true.into())
            .await?;
    }
    Ok(())
}
