use std::time::Duration;

/// Tunables for [`crate::WatchdogClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long to wait for the Bluetooth adapter to power on
    pub power_on_timeout: Duration,
    /// How long to scan for the target device before giving up
    pub discovery_timeout: Duration,
    /// How many times to retry connecting after the first attempt fails
    pub connect_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            power_on_timeout: Duration::from_secs(10),
            discovery_timeout: Duration::from_secs(5),
            connect_retries: 2,
        }
    }
}

#[test]
fn test_default_waits_ten_seconds_for_power_on() {
    assert_eq!(ClientConfig::default().power_on_timeout, Duration::from_secs(10));
}
