//! Command surface and its CLI-facing strings.
//!
//! Free functions rather than methods on a struct: each one takes the
//! currently active driver (or `None` if no vehicle is selected) plus
//! whatever config it needs, and renders the exact user-visible string the
//! out-of-scope CLI shell prints for `Success`/`Fail`/`NotImplemented`.

use super::{ChargeState, CommandResult, VehicleDriver};
use super::stat::format_stat;
use crate::config::Config;

const NO_VEHICLE_SELECTED: &str = "Error: No vehicle module selected";

/// `PinCheck(pin)`: compares against `password.pin`, and
/// always fails closed when no PIN is configured.
fn pin_check(config: &Config, pin: &str) -> bool {
    !config.password.pin.is_empty() && config.password.pin == pin
}

pub async fn wakeup(driver: Option<&mut dyn VehicleDriver>) -> String {
    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_wakeup().await {
        CommandResult::Success => "Vehicle has been woken".to_string(),
        CommandResult::Fail => "Error: vehicle could not be woken".to_string(),
        CommandResult::NotImplemented => {
            "Error: Vehicle wake functionality not available".to_string()
        }
    }
}

/// `homelink(button:1..3, duration_ms>=100)`. `button` is the
/// 1-based CLI argument; the zero-based index reaches the driver.
pub async fn homelink(
    driver: Option<&mut dyn VehicleDriver>,
    button: u8,
    duration_ms: Option<u32>,
) -> String {
    if !(1..=3).contains(&button) {
        return "Error: homelink button must be between 1 and 3".to_string();
    }
    let duration_ms = duration_ms.unwrap_or(1000);
    if duration_ms < 100 {
        return "Error: homelink duration must be at least 100ms".to_string();
    }

    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_homelink(button - 1, duration_ms).await {
        CommandResult::Success => format!("Homelink #{button} activated"),
        CommandResult::Fail => format!("Error: homelink #{button} could not be activated"),
        CommandResult::NotImplemented => {
            "Error: Homelink functionality not available".to_string()
        }
    }
}

pub async fn lock(driver: Option<&mut dyn VehicleDriver>, pin: &str, config: &Config) -> String {
    if !pin_check(config, pin) {
        return "Error: incorrect PIN".to_string();
    }
    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_lock(pin).await {
        CommandResult::Success => "Vehicle locked".to_string(),
        CommandResult::Fail => "Error: vehicle could not be locked".to_string(),
        CommandResult::NotImplemented => "Error: Lock functionality not available".to_string(),
    }
}

pub async fn unlock(driver: Option<&mut dyn VehicleDriver>, pin: &str, config: &Config) -> String {
    if !pin_check(config, pin) {
        return "Error: incorrect PIN".to_string();
    }
    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_unlock(pin).await {
        CommandResult::Success => "Vehicle unlocked".to_string(),
        CommandResult::Fail => "Error: vehicle could not be unlocked".to_string(),
        CommandResult::NotImplemented => "Error: Unlock functionality not available".to_string(),
    }
}

pub async fn valet(driver: Option<&mut dyn VehicleDriver>, pin: &str, config: &Config) -> String {
    if !pin_check(config, pin) {
        return "Error: incorrect PIN".to_string();
    }
    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_valet(pin).await {
        CommandResult::Success => "Vehicle valeted".to_string(),
        CommandResult::Fail => "Error: vehicle could not enter valet mode".to_string(),
        CommandResult::NotImplemented => "Error: Valet functionality not available".to_string(),
    }
}

pub async fn unvalet(
    driver: Option<&mut dyn VehicleDriver>,
    pin: &str,
    config: &Config,
) -> String {
    if !pin_check(config, pin) {
        return "Error: incorrect PIN".to_string();
    }
    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_unvalet(pin).await {
        CommandResult::Success => "Vehicle unvaleted".to_string(),
        CommandResult::Fail => "Error: vehicle could not exit valet mode".to_string(),
        CommandResult::NotImplemented => "Error: Valet functionality not available".to_string(),
    }
}

pub async fn charge_mode(driver: Option<&mut dyn VehicleDriver>, mode: &str) -> String {
    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_charge_mode(mode).await {
        CommandResult::Success => format!("Charge mode '{mode}' set"),
        CommandResult::Fail => format!("Error: could not set charge mode '{mode}'"),
        CommandResult::NotImplemented => {
            "Error: Charge mode control not available".to_string()
        }
    }
}

pub async fn charge_start(driver: Option<&mut dyn VehicleDriver>) -> String {
    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_charge_start().await {
        CommandResult::Success => "Charge has been started".to_string(),
        CommandResult::Fail => "Error: charge could not be started".to_string(),
        CommandResult::NotImplemented => "Error: Charge control not available".to_string(),
    }
}

pub async fn charge_stop(driver: Option<&mut dyn VehicleDriver>) -> String {
    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_charge_stop().await {
        CommandResult::Success => "Charge has been stopped".to_string(),
        CommandResult::Fail => "Error: charge could not be stopped".to_string(),
        CommandResult::NotImplemented => "Error: Charge control not available".to_string(),
    }
}

pub async fn charge_cooldown(driver: Option<&mut dyn VehicleDriver>) -> String {
    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_charge_cooldown().await {
        CommandResult::Success => "Cooldown has been started".to_string(),
        CommandResult::Fail => "Error: cooldown could not be started".to_string(),
        CommandResult::NotImplemented => "Error: Charge control not available".to_string(),
    }
}

/// `charge current(amps)`. The literal success string omits
/// the requested amperage.
pub async fn charge_current(driver: Option<&mut dyn VehicleDriver>, amps: u32) -> String {
    let Some(driver) = driver else {
        return NO_VEHICLE_SELECTED.to_string();
    };
    match driver.command_charge_current(amps).await {
        CommandResult::Success => "Charge current limit set to NA".to_string(),
        CommandResult::Fail => "Error: could not set charge current limit".to_string(),
        CommandResult::NotImplemented => {
            "Error: Charge current control not available".to_string()
        }
    }
}

/// `stat(verbosity, writer)` / CLI `vehicle status`
pub fn stat(driver: Option<&dyn VehicleDriver>, config: &Config) -> String {
    match driver {
        Some(driver) => format_stat(&driver.snapshot(), config),
        None => "No vehicle module selected".to_string(),
    }
}

/// CLI `vehicle list`: a `TYPE NAME` header plus one row per
/// registered driver descriptor.
pub fn list_drivers() -> String {
    let mut out = String::from("TYPE NAME\n");
    for (code, name) in super::registry::list() {
        out.push_str(&format!("{code} {name}\n"));
    }
    out
}

/// CLI `vehicle module [code]` output is silent on success; this
/// exists only so callers have a single message to print on an unknown code.
pub fn unknown_module_code(code: &str) -> String {
    format!("Error: unknown vehicle module '{code}'")
}

/// Cosmetic helper shared with the web surface: renders the debounce-armed
/// charge state's CLI label, used by status endpoints that don't need the
/// full stat body.
pub fn charge_state_label(state: Option<ChargeState>) -> &'static str {
    state.map_or("Unknown", ChargeState::label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::FixtureDriver;

    fn configured_pin() -> Config {
        let mut config = Config::default();
        config.password.pin = "1234".to_string();
        config
    }

    #[tokio::test]
    async fn wakeup_with_no_driver_reports_no_module_selected() {
        assert_eq!(wakeup(None).await, NO_VEHICLE_SELECTED);
    }

    #[tokio::test]
    async fn wakeup_success_matches_fixture() {
        let mut driver = FixtureDriver::new();
        assert_eq!(wakeup(Some(&mut driver)).await, "Vehicle has been woken");
        assert_eq!(driver.wakeups, 1);
    }

    #[tokio::test]
    async fn homelink_rejects_out_of_range_button_without_touching_driver() {
        let mut driver = FixtureDriver::new();
        let out = homelink(Some(&mut driver), 4, None).await;
        assert!(out.starts_with("Error"));
    }

    #[tokio::test]
    async fn homelink_rejects_short_duration() {
        let mut driver = FixtureDriver::new();
        let out = homelink(Some(&mut driver), 1, Some(50)).await;
        assert!(out.contains("100ms"));
    }

    #[tokio::test]
    async fn lock_requires_correct_pin() {
        let mut driver = FixtureDriver::new();
        let config = configured_pin();
        assert_eq!(
            lock(Some(&mut driver), "wrong", &config).await,
            "Error: incorrect PIN"
        );
        assert_eq!(lock(Some(&mut driver), "1234", &config).await, "Vehicle locked");
        assert!(driver.locked);
    }

    #[tokio::test]
    async fn lock_fails_closed_when_no_pin_configured() {
        let mut driver = FixtureDriver::new();
        let config = Config::default();
        assert_eq!(
            lock(Some(&mut driver), "", &config).await,
            "Error: incorrect PIN"
        );
    }

    #[tokio::test]
    async fn charge_current_renders_literal_na() {
        let mut driver = FixtureDriver::new();
        assert_eq!(
            charge_current(Some(&mut driver), 32).await,
            "Error: Charge current control not available"
        );
    }

    #[test]
    fn stat_with_no_driver_reports_no_module_selected() {
        assert_eq!(stat(None, &Config::default()), "No vehicle module selected");
    }
}
