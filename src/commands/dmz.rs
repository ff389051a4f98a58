//! Advanced DMZ host: forward all unsolicited WAN traffic to one LAN host.

use crate::client::{ClientError, Gateway};

use super::flipflop;

const DMZ_ENABLE: &str = "Device/Services/BellNetworkCfg/AdvancedDMZ/Enable";
const DMZ_HOST: &str = "Device/Services/BellNetworkCfg/AdvancedDMZ/AdvancedDMZhost";

/// Point the DMZ at `mac` (already validated and uppercased) and enable it.
///
/// The gateway only applies a host change while the DMZ is off, so the
/// enable flag is cleared around the write.
pub async fn enable_advanced_dmz<G: Gateway>(gateway: &mut G, mac: &str) -> Result<(), ClientError> {
    flipflop(gateway, DMZ_ENABLE, vec![(DMZ_HOST.to_string(), mac.into())]).await
}

pub async fn disable_advanced_dmz<G: Gateway>(gateway: &mut G) -> Result<(), ClientError> {
    gateway.set_value(DMZ_ENABLE, false.into()).await
}

#[cfg(test)]
mod tests {
    use super::super::fake::FakeGateway;
    use super::*;

    #[tokio::test]
    async fn enable_sets_host_between_toggles() {
        let mut gw = FakeGateway::default();
        enable_advanced_dmz(&mut gw, "AA:BB:CC:DD:EE:FF").await.unwrap();
        assert_eq!(
            gw.sets,
            vec![
                (DMZ_ENABLE.to_string(), "False".to_string()),
                (DMZ_HOST.to_string(), "AA:BB:CC:DD:EE:FF".to_string()),
                (DMZ_ENABLE.to_string(), "True".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn disable_clears_flag_only() {
        let mut gw = FakeGateway::default();
        disable_advanced_dmz(&mut gw).await.unwrap();
        assert_eq!(gw.sets, vec![(DMZ_ENABLE.to_string(), "False".to_string())]);
    }
}
