//! Host watchdog of the RTD card.
//!
//! Once armed, the card cuts the host's power if it is not reloaded within
//! the period, keeps it off for the off interval, then powers it back on
//! with the initial period giving the host time to boot.

use crate::bus::Bus;
use crate::rtd::{device_address, Error, MegaRtd};

const WDT_RESET_ADDR: u8 = 35;
const WDT_INTERVAL_SET_ADDR: u8 = 36;
const WDT_INTERVAL_GET_ADDR: u8 = 38;
const WDT_INIT_INTERVAL_SET_ADDR: u8 = 40;
const WDT_INIT_INTERVAL_GET_ADDR: u8 = 42;
const WDT_RESET_COUNT_ADDR: u8 = 44;
const WDT_POWER_OFF_INTERVAL_SET_ADDR: u8 = 47;
const WDT_POWER_OFF_INTERVAL_GET_ADDR: u8 = 51;

const WDT_RESET_SIGNATURE: u8 = 0xCA;

/// Longest power-off interval, 48 days.
pub const WDT_MAX_OFF_INTERVAL_S: u32 = 48 * 24 * 3600;

impl<B> MegaRtd<B>
where
    B: Bus,
{
    /// Reload the watchdog, arming it if it was disabled.
    pub fn wdt_reload(&mut self, stack: u8) -> Result<(), Error<B::Error>> {
        let address = device_address(stack)?;
        self.write_data(address, WDT_RESET_ADDR, &[WDT_RESET_SIGNATURE])
    }

    /// Reload period in seconds.
    pub fn wdt_period(&mut self, stack: u8) -> Result<u16, Error<B::Error>> {
        self.read_u16(stack, WDT_INTERVAL_GET_ADDR)
    }

    pub fn set_wdt_period(&mut self, stack: u8, seconds: u16) -> Result<(), Error<B::Error>> {
        self.write_u16(stack, WDT_INTERVAL_SET_ADDR, seconds)
    }

    /// Period loaded after a power cycle, in seconds.
    pub fn wdt_initial_period(&mut self, stack: u8) -> Result<u16, Error<B::Error>> {
        self.read_u16(stack, WDT_INIT_INTERVAL_GET_ADDR)
    }

    pub fn set_wdt_initial_period(&mut self, stack: u8, seconds: u16) -> Result<(), Error<B::Error>> {
        self.write_u16(stack, WDT_INIT_INTERVAL_SET_ADDR, seconds)
    }

    /// Time the host is kept powered off after an expiry, in seconds.
    pub fn wdt_off_period(&mut self, stack: u8) -> Result<u32, Error<B::Error>> {
        let address = device_address(stack)?;
        let data = self.read_data(address, WDT_POWER_OFF_INTERVAL_GET_ADDR)?;
        Ok(u32::from_le_bytes(data))
    }

    pub fn set_wdt_off_period(&mut self, stack: u8, seconds: u32) -> Result<(), Error<B::Error>> {
        let address = device_address(stack)?;
        if seconds == 0 || seconds > WDT_MAX_OFF_INTERVAL_S {
            return Err(Error::InvalidValue);
        }
        self.write_data(address, WDT_POWER_OFF_INTERVAL_SET_ADDR, &seconds.to_le_bytes())
    }

    /// Number of host resets triggered by the watchdog.
    pub fn wdt_reset_count(&mut self, stack: u8) -> Result<u16, Error<B::Error>> {
        self.read_u16(stack, WDT_RESET_COUNT_ADDR)
    }

    fn read_u16(&mut self, stack: u8, register: u8) -> Result<u16, Error<B::Error>> {
        let address = device_address(stack)?;
        let data = self.read_data(address, register)?;
        Ok(u16::from_le_bytes(data))
    }

    fn write_u16(&mut self, stack: u8, register: u8, seconds: u16) -> Result<(), Error<B::Error>> {
        let address = device_address(stack)?;
        if seconds == 0 {
            return Err(Error::InvalidValue);
        }
        self.write_data(address, register, &seconds.to_le_bytes())
    }
}
