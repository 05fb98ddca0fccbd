//! Transport contract for the two-wire bus.
//!
//! A [`Bus`] hands out a short-lived I²C handle for a single transaction.
//! The handle is released when it is dropped, so every exit path of a
//! transaction (success or failure) gives the bus back.

use core::cell::RefCell;

use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::RefCellDevice;

/// Source of scoped I²C handles.
pub trait Bus {
    /// Error raised while opening the bus or during a transaction.
    type Error: core::fmt::Debug;
    /// Handle used for one transaction; dropping it releases the bus.
    type Handle: I2c<Error = Self::Error>;

    /// Acquire a handle to the bus.
    fn open(&mut self) -> Result<Self::Handle, Self::Error>;
}

/// Shares one bus between drivers on a single thread.
impl<'a, I2C> Bus for &'a RefCell<I2C>
where
    I2C: I2c,
{
    type Error = I2C::Error;
    type Handle = RefCellDevice<'a, I2C>;

    fn open(&mut self) -> Result<Self::Handle, Self::Error> {
        Ok(RefCellDevice::new(*self))
    }
}

/// Shares one bus between threads. The lock is held for each transaction.
#[cfg(feature = "std")]
impl<'a, I2C> Bus for &'a std::sync::Mutex<I2C>
where
    I2C: I2c,
{
    type Error = I2C::Error;
    type Handle = embedded_hal_bus::i2c::MutexDevice<'a, I2C>;

    fn open(&mut self) -> Result<Self::Handle, Self::Error> {
        Ok(embedded_hal_bus::i2c::MutexDevice::new(*self))
    }
}

#[cfg(all(feature = "linux", target_os = "linux"))]
pub use self::linux::{LinuxBus, DEFAULT_I2C_PATH};

#[cfg(all(feature = "linux", target_os = "linux"))]
mod linux {
    use std::path::{Path, PathBuf};

    use linux_embedded_hal::{I2CError, I2cdev};

    use super::Bus;

    /// Bus adapter of the Raspberry Pi header.
    pub const DEFAULT_I2C_PATH: &str = "/dev/i2c-1";

    /// Linux `i2c-dev` transport.
    ///
    /// The device node is opened on every [`Bus::open`] and closed when the
    /// handle drops, so no file descriptor outlives a transaction.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LinuxBus {
        path: PathBuf,
    }

    impl LinuxBus {
        pub fn new(path: impl AsRef<Path>) -> Self {
            LinuxBus {
                path: path.as_ref().to_path_buf(),
            }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Default for LinuxBus {
        fn default() -> Self {
            LinuxBus::new(DEFAULT_I2C_PATH)
        }
    }

    impl Bus for LinuxBus {
        type Error = I2CError;
        type Handle = I2cdev;

        fn open(&mut self) -> Result<Self::Handle, Self::Error> {
            I2cdev::new(&self.path).map_err(I2CError::from)
        }
    }

}

/// Test double counting how many handles were opened and released.
#[cfg(test)]
pub(crate) mod testing {
    use std::cell::Cell;
    use std::rc::Rc;

    use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    use super::Bus;

    pub struct CountingBus {
        i2c: Mock,
        fail_open: bool,
        opened: Rc<Cell<usize>>,
        released: Rc<Cell<usize>>,
    }

    impl CountingBus {
        pub fn new(expectations: &[Transaction]) -> Self {
            CountingBus {
                i2c: Mock::new(expectations),
                fail_open: false,
                opened: Rc::new(Cell::new(0)),
                released: Rc::new(Cell::new(0)),
            }
        }

        /// A bus whose adapter cannot be opened at all.
        pub fn unavailable() -> Self {
            CountingBus {
                fail_open: true,
                ..CountingBus::new(&[])
            }
        }

        pub fn opened(&self) -> usize {
            self.opened.get()
        }

        pub fn released(&self) -> usize {
            self.released.get()
        }

        pub fn done(&mut self) {
            self.i2c.done();
        }
    }

    pub struct CountingHandle {
        i2c: Mock,
        released: Rc<Cell<usize>>,
    }

    impl Drop for CountingHandle {
        fn drop(&mut self) {
            self.released.set(self.released.get() + 1);
        }
    }

    impl ErrorType for CountingHandle {
        type Error = ErrorKind;
    }

    impl I2c for CountingHandle {
        fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
            self.i2c.read(address, read)
        }

        fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
            self.i2c.write(address, write)
        }

        fn write_read(&mut self, address: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
            self.i2c.write_read(address, write, read)
        }

        fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
            self.i2c.transaction(address, operations)
        }
    }

    impl Bus for CountingBus {
        type Error = ErrorKind;
        type Handle = CountingHandle;

        fn open(&mut self) -> Result<Self::Handle, Self::Error> {
            self.opened.set(self.opened.get() + 1);
            if self.fail_open {
                return Err(ErrorKind::Other);
            }
            Ok(CountingHandle {
                i2c: self.i2c.clone(),
                released: self.released.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::i2c::I2c;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    use super::testing::CountingBus;
    use super::*;

    #[test]
    fn refcell_handle_reaches_shared_bus() {
        let expectations = [Transaction::write_read(0x40, vec![57], vec![1])];
        let i2c = Mock::new(&expectations);
        let mut i2c_clone = i2c.clone();
        let cell = RefCell::new(i2c);

        let mut bus = &cell;
        let mut handle = bus.open().unwrap();
        let mut buf = [0u8; 1];
        handle.write_read(0x40, &[57], &mut buf).unwrap();
        assert_eq!(buf, [1]);
        drop(handle);

        // the cell is free again once the handle is gone
        assert!(cell.try_borrow_mut().is_ok());
        i2c_clone.done();
    }

    #[cfg(feature = "std")]
    #[test]
    fn mutex_bus_is_shared_between_threads() {
        use std::sync::Mutex;

        let expectations = [
            Transaction::write_read(0x40, vec![57], vec![1]),
            Transaction::write_read(0x40, vec![57], vec![1]),
        ];
        let i2c = Mock::new(&expectations);
        let mut i2c_clone = i2c.clone();
        let mutex = Mutex::new(i2c);

        std::thread::scope(|s| {
            for _ in 0..2 {
                s.spawn(|| {
                    let mut bus = &mutex;
                    let mut handle = bus.open().unwrap();
                    let mut buf = [0u8; 1];
                    handle.write_read(0x40, &[57], &mut buf).unwrap();
                });
            }
        });
        i2c_clone.done();
    }

    #[test]
    fn counting_bus_tracks_handles() {
        let mut bus = CountingBus::new(&[]);
        {
            let _handle = bus.open().unwrap();
            assert_eq!(bus.released(), 0);
        }
        assert_eq!(bus.opened(), 1);
        assert_eq!(bus.released(), 1);
        bus.done();
    }
}
