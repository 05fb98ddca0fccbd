//! Stackable 8-channel RTD data acquisition card.
//!
//! Up to 8 cards share one bus; each answers at `0x40 + stack`. Every
//! channel reading is a little endian IEEE-754 `f32` in a 4-byte slot.
//!
//! - Temperature resolution: as computed by the card firmware (linear fit)
//! - Resistance: raw, in ohms
//!
//! Each call performs exactly one bus transaction on a freshly opened handle
//! and returns errors as-is: there are no retries and no sentinel values.
//! Concurrent callers on the same physical bus must share it through a
//! locking [`Bus`] such as `&Mutex<I2C>`.

use core::fmt;

use embedded_hal::i2c::I2c;

use crate::bus::Bus;
use crate::curve::PT100_POLY5;

const MEGARTD_I2C_ADDR_BASE: u8 = 0x40;

/// Highest stack level selectable with the address jumpers.
pub const STACK_MAX: u8 = 7;
pub const CHANNEL_MIN: u8 = 1;
pub const CHANNEL_MAX: u8 = 8;

const RTD_SLOT_LEN: usize = 4;

const RTD_TEMPERATURE_ADDR: u8 = 0;
const RTD_RESISTANCE_ADDR: u8 = 59;

// i8 °C, followed by the 5V rail as u16 mV
const DIAG_TEMPERATURE_ADDR: u8 = 32;

const REVISION_HW_MAJOR_ADDR: u8 = 55;
const REVISION_MAJOR_ADDR: u8 = 57;

/// RTD card errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Stack level outside `0..=7`
    InvalidStack(u8),
    /// Channel outside `1..=8`
    InvalidChannel(u8),
    /// Setting outside the range accepted by the firmware
    InvalidValue,
    /// I²C bus error, while opening the bus or during the transaction
    I2c(E),
}

impl<E> Error<E> {
    /// `true` if the request was rejected before touching the bus.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Error::I2c(_))
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidStack(stack) => write!(f, "invalid stack level {} [0..{}]", stack, STACK_MAX),
            Error::InvalidChannel(channel) => write!(
                f,
                "invalid channel number {} [{}..{}]",
                channel, CHANNEL_MIN, CHANNEL_MAX
            ),
            Error::InvalidValue => f.write_str("value out of range"),
            Error::I2c(err) => write!(f, "fail to communicate with the RTD card: {:?}", err),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for Error<E> {}

/// Which per-channel register block to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Measurement {
    /// Temperature computed on the card, °C
    Temperature,
    /// Raw sensor resistance, Ω
    Resistance,
}

impl Measurement {
    fn base_addr(&self) -> u8 {
        match self {
            Measurement::Temperature => RTD_TEMPERATURE_ADDR,
            Measurement::Resistance => RTD_RESISTANCE_ADDR,
        }
    }
}

/// Firmware or hardware revision, e.g. `1.02`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Revision {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// Card self-diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    /// on-board temperature in degrees celsius
    pub temperature: i8,
    /// 5V rail in volts
    pub supply_5v: f32,
}

/// Set of stack levels that answered a [`MegaRtd::scan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stacks(u8);

impl Stacks {
    pub fn contains(&self, stack: u8) -> bool {
        stack <= STACK_MAX && self.0 & (1 << stack) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> {
        let bits = self.0;
        (0..=STACK_MAX).filter(move |stack| bits & (1 << *stack) != 0)
    }

    fn insert(&mut self, stack: u8) {
        self.0 |= 1 << stack;
    }
}

/// Bus address of the card at `stack`.
pub fn device_address<E>(stack: u8) -> Result<u8, Error<E>> {
    if stack > STACK_MAX {
        return Err(Error::InvalidStack(stack));
    }
    Ok(MEGARTD_I2C_ADDR_BASE + stack)
}

/// Register offset of `channel` inside the `measurement` block.
pub fn channel_register<E>(measurement: Measurement, channel: u8) -> Result<u8, Error<E>> {
    if !(CHANNEL_MIN..=CHANNEL_MAX).contains(&channel) {
        return Err(Error::InvalidChannel(channel));
    }
    Ok(measurement.base_addr() + (RTD_SLOT_LEN as u8) * (channel - CHANNEL_MIN))
}

/// Driver for all RTD cards stacked on one bus.
#[derive(Debug)]
pub struct MegaRtd<B> {
    bus: B,
}

impl<B> MegaRtd<B>
where
    B: Bus,
{
    pub fn new(bus: B) -> Self {
        MegaRtd { bus }
    }

    pub fn release(self) -> B {
        self.bus
    }

    /// Temperature of `channel` as linearized by the card, in °C.
    pub fn get_temperature(&mut self, stack: u8, channel: u8) -> Result<f32, Error<B::Error>> {
        self.read_channel(stack, channel, Measurement::Temperature)
    }

    /// Raw resistance of `channel`, in Ω.
    pub fn get_resistance(&mut self, stack: u8, channel: u8) -> Result<f32, Error<B::Error>> {
        self.read_channel(stack, channel, Measurement::Resistance)
    }

    /// Temperature of `channel` in °C, converted from its resistance with
    /// [`PT100_POLY5`].
    ///
    /// Outside -200°C..660°C the result is an increasingly inaccurate
    /// extrapolation.
    pub fn get_temperature_poly5(&mut self, stack: u8, channel: u8) -> Result<f64, Error<B::Error>> {
        let res = self.get_resistance(stack, channel)?;
        Ok(PT100_POLY5.eval(f64::from(res)))
    }

    pub fn read_channel(
        &mut self,
        stack: u8,
        channel: u8,
        measurement: Measurement,
    ) -> Result<f32, Error<B::Error>> {
        let data = self.read_block(stack, channel, measurement)?;
        Ok(f32::from_le_bytes(data))
    }

    /// Raw 4-byte slot of `channel`. Arguments are checked before the bus is opened.
    pub fn read_block(
        &mut self,
        stack: u8,
        channel: u8,
        measurement: Measurement,
    ) -> Result<[u8; RTD_SLOT_LEN], Error<B::Error>> {
        let address = device_address(stack)?;
        let register = channel_register(measurement, channel)?;
        self.read_data(address, register)
    }

    /// Check whether a card answers at `stack`.
    ///
    /// A bus failure means "not detected" and is not reported as an error.
    pub fn probe(&mut self, stack: u8) -> Result<bool, Error<B::Error>> {
        let address = device_address(stack)?;
        match self.read_data::<1>(address, REVISION_MAJOR_ADDR) {
            Ok(_) => Ok(true),
            Err(Error::I2c(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Probe every stack level.
    pub fn scan(&mut self) -> Stacks {
        let mut found = Stacks::default();
        for stack in 0..=STACK_MAX {
            if let Ok(true) = self.probe(stack) {
                found.insert(stack);
            }
        }
        found
    }

    pub fn firmware_version(&mut self, stack: u8) -> Result<Revision, Error<B::Error>> {
        self.read_revision(stack, REVISION_MAJOR_ADDR)
    }

    pub fn hardware_version(&mut self, stack: u8) -> Result<Revision, Error<B::Error>> {
        self.read_revision(stack, REVISION_HW_MAJOR_ADDR)
    }

    pub fn diagnostics(&mut self, stack: u8) -> Result<Diagnostics, Error<B::Error>> {
        let address = device_address(stack)?;
        let data: [u8; 3] = self.read_data(address, DIAG_TEMPERATURE_ADDR)?;
        let millivolts = u16::from_le_bytes([data[1], data[2]]);
        Ok(Diagnostics {
            temperature: data[0] as i8,
            supply_5v: millivolts as f32 / 1000.0,
        })
    }

    fn read_revision(&mut self, stack: u8, register: u8) -> Result<Revision, Error<B::Error>> {
        let address = device_address(stack)?;
        let [major, minor] = self.read_data(address, register)?;
        Ok(Revision { major, minor })
    }

    /// Block read of `N` bytes starting at `register`.
    ///
    /// The handle is dropped before returning, on success and on error.
    pub(crate) fn read_data<const N: usize>(
        &mut self,
        address: u8,
        register: u8,
    ) -> Result<[u8; N], Error<B::Error>> {
        #[cfg(feature = "defmt")]
        defmt::trace!("read {=usize} bytes from {=u8:#x} @ {=u8}", N, address, register);

        let mut handle = self.bus.open().map_err(Error::I2c)?;
        let mut data = [0u8; N];
        handle.write_read(address, &[register], &mut data).map_err(Error::I2c)?;
        Ok(data)
    }

    /// Write `payload` starting at `register`.
    pub(crate) fn write_data(&mut self, address: u8, register: u8, payload: &[u8]) -> Result<(), Error<B::Error>> {
        #[cfg(feature = "defmt")]
        defmt::trace!("write {=[u8]} to {=u8:#x} @ {=u8}", payload, address, register);

        let mut frame = [0u8; 5];
        let len = payload.len();
        if len >= frame.len() {
            return Err(Error::InvalidValue);
        }
        frame[0] = register;
        frame[1..=len].copy_from_slice(payload);

        let mut handle = self.bus.open().map_err(Error::I2c)?;
        handle.write(address, &frame[..=len]).map_err(Error::I2c)
    }
}
