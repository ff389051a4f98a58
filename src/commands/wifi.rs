//! `disable-wifi-radios`: switch off selected active radios.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::CommandError;
use crate::client::Gateway;
use crate::terminal::Terminal;

const RADIOS: &str = "Device/WiFi/Radios";

#[derive(Deserialize)]
struct Radio {
    #[serde(alias = "Alias")]
    alias: String,
    #[serde(alias = "Enable")]
    enable: bool,
}

fn radio_enable_xpath(alias: &str) -> String {
    format!("{RADIOS}/Radio[Alias='{alias}']/Enable")
}

/// Aliases of enabled radios, in gateway order.
fn active_radios(value: &Value) -> Result<Vec<String>, CommandError> {
    let items = value.as_array().ok_or_else(|| CommandError::Unexpected {
        xpath: RADIOS.to_string(),
        reason: "expected a list of radios".to_string(),
    })?;
    let mut active = Vec::new();
    for item in items {
        match Radio::deserialize(item) {
            Ok(radio) if radio.enable && !active.contains(&radio.alias) => active.push(radio.alias),
            Ok(_) => {}
            Err(e) => debug!("skipping radio record: {e}"),
        }
    }
    Ok(active)
}

pub async fn disable_wifi_radios<G: Gateway, T: Terminal>(
    gateway: &mut G,
    terminal: &mut T,
    requested: &[String],
) -> Result<(), CommandError> {
    let active = active_radios(&gateway.get_value(RADIOS).await?)?;
    if active.is_empty() {
        terminal.print("No active radios");
        return Ok(());
    }

    let requested = if requested.is_empty() {
        vec![terminal.choose("Choose radio", &active)?]
    } else {
        let mut unique: Vec<String> = Vec::new();
        for alias in requested {
            if !unique.contains(alias) {
                unique.push(alias.clone());
            }
        }
        unique
    };

    let invalid: Vec<&str> = requested
        .iter()
        .filter(|alias| !active.contains(alias))
        .map(String::as_str)
        .collect();
    if !invalid.is_empty() {
        return Err(CommandError::Usage(format!(
            "Invalid radio(s): {}",
            invalid.join(", ")
        )));
    }

    for alias in &requested {
        gateway
            .set_value(&radio_enable_xpath(alias), false.into())
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::fake::FakeGateway;
    use super::*;
    use crate::terminal::testing::ScriptedTerminal;

    fn radios() -> Value {
        json!([
            {"alias": "RADIO2G4", "enable": true, "channel": 6},
            {"alias": "RADIO5G", "enable": true},
            {"alias": "RADIO6G", "enable": false},
            {"enable": true}
        ])
    }

    #[tokio::test]
    async fn disables_requested_radios() {
        let mut gw = FakeGateway::default().with(RADIOS, radios());
        let mut term = ScriptedTerminal::default();
        let requested = vec!["RADIO5G".to_string(), "RADIO5G".to_string()];

        disable_wifi_radios(&mut gw, &mut term, &requested)
            .await
            .unwrap();

        assert_eq!(
            gw.sets,
            vec![(
                "Device/WiFi/Radios/Radio[Alias='RADIO5G']/Enable".to_string(),
                "False".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn prompts_with_active_choices() {
        let mut gw = FakeGateway::default().with(RADIOS, radios());
        let mut term = ScriptedTerminal::with_answers(&["RADIO2G4"]);

        disable_wifi_radios(&mut gw, &mut term, &[]).await.unwrap();

        assert_eq!(term.prompts, vec!["Choose radio (RADIO2G4, RADIO5G)".to_string()]);
        assert_eq!(gw.sets[0].0, radio_enable_xpath("RADIO2G4"));
    }

    #[tokio::test]
    async fn inactive_radio_is_usage_error() {
        let mut gw = FakeGateway::default().with(RADIOS, radios());
        let mut term = ScriptedTerminal::default();
        let requested = vec![
            "RADIO2G4".to_string(),
            "RADIO6G".to_string(),
            "GUEST".to_string(),
        ];

        let err = disable_wifi_radios(&mut gw, &mut term, &requested)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid radio(s): RADIO6G, GUEST");
        assert_eq!(err.exit_code(), 2);
        assert!(gw.sets.is_empty());
    }

    #[tokio::test]
    async fn no_active_radios_is_not_an_error() {
        let mut gw = FakeGateway::default().with(RADIOS, json!([{"Alias": "RADIO5G", "Enable": false}]));
        let mut term = ScriptedTerminal::default();

        disable_wifi_radios(&mut gw, &mut term, &["RADIO5G".to_string()])
            .await
            .unwrap();

        assert_eq!(term.stdout, vec!["No active radios".to_string()]);
        assert!(gw.sets.is_empty());
    }

    #[test]
    fn gateway_casing_is_accepted() {
        let active = active_radios(&json!([{"Alias": "RADIO5G", "Enable": true}])).unwrap();
        assert_eq!(active, vec!["RADIO5G".to_string()]);
    }
}
