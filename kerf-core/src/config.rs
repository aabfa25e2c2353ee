//! Persistent controller settings
//!
//! The handful of configuration values the substrate itself consumes,
//! stored in EEPROM as a postcard-encoded block behind the checksum
//! trailer. Layout starting at [`SETTINGS_ADDR`]:
//!
//! ```text
//! [version][len][postcard payload ...][checksum]
//! ```
//!
//! A version bump, bad length, or checksum mismatch all surface as
//! typed errors; the caller falls back to [`Settings::default`] and
//! rewrites the block.

use kerf_hal::eeprom::EepromCell;
use serde::{Deserialize, Serialize};

use crate::eeprom::EepromStore;

/// EEPROM address of the settings block
pub const SETTINGS_ADDR: u16 = 0;

/// Bumped whenever the settings layout changes
pub const SETTINGS_VERSION: u8 = 1;

/// Maximum encoded settings payload
const SETTINGS_MAX: usize = 32;

/// Settings load/store failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// Stored version byte does not match this firmware
    Version,
    /// Stored length is impossible
    Length,
    /// Checksum trailer mismatch
    Checksum,
    /// Payload did not encode/decode
    Encoding,
}

/// Controller settings consumed by the substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Probe pin is wired normally-low instead of normally-high
    pub invert_probe_pin: bool,
    /// Enable XON/XOFF flow control on the serial link
    pub rx_flow_control: bool,
    /// Power up in alarm until homed (machines with homing switches)
    pub homing_lock_on_boot: bool,
    /// Range sensor I/O timeout in milliseconds
    pub sensor_timeout_ms: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            invert_probe_pin: false,
            rx_flow_control: false,
            homing_lock_on_boot: false,
            sensor_timeout_ms: 500,
        }
    }
}

impl Settings {
    /// Persist the settings block
    pub fn save<C: EepromCell>(
        &self,
        store: &mut EepromStore<C>,
    ) -> Result<(), SettingsError> {
        let mut buf = [0u8; SETTINGS_MAX];
        let used = postcard::to_slice(self, &mut buf)
            .map_err(|_| SettingsError::Encoding)?
            .len();

        store.put_byte(SETTINGS_ADDR, SETTINGS_VERSION);
        store.put_byte(SETTINGS_ADDR + 1, used as u8);
        store.write_block_with_checksum(SETTINGS_ADDR + 2, &buf[..used]);
        Ok(())
    }

    /// Load the settings block
    pub fn load<C: EepromCell>(store: &mut EepromStore<C>) -> Result<Self, SettingsError> {
        if store.get_byte(SETTINGS_ADDR) != SETTINGS_VERSION {
            return Err(SettingsError::Version);
        }
        let len = store.get_byte(SETTINGS_ADDR + 1) as usize;
        if len == 0 || len > SETTINGS_MAX {
            return Err(SettingsError::Length);
        }

        let mut buf = [0u8; SETTINGS_MAX];
        store
            .read_block_with_checksum(&mut buf[..len], SETTINGS_ADDR + 2)
            .map_err(|_| SettingsError::Checksum)?;

        postcard::from_bytes(&buf[..len]).map_err(|_| SettingsError::Encoding)
    }
}
