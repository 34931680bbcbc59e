//! Generic `BusTransfer` trait for polled byte-exchange buses (I2C, SPI, …).

use beacon_types::BeaconError;

/// A device reachable over a polled bus.
///
/// Drivers implement this trait and are wrapped by a
/// [`BeaconDevice`][crate::device::BeaconDevice].  The trait only exposes
/// raw byte exchange; addressing and enumeration are the driver's business.
pub trait BusTransfer: Send {
    /// Stable identifier for this device, e.g. `"uls-qr1"`.
    fn id(&self) -> &str;

    /// Bring the bus up.  Called once before the first transfer.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::Init`] if the bus cannot be opened.
    fn init(&mut self) -> Result<(), BeaconError> {
        Ok(())
    }

    /// Write `send` to the device, then fill `recv` from it.  Either slice
    /// may be empty.
    ///
    /// # Errors
    ///
    /// Returns [`BeaconError::BusTransfer`] when the exchange fails (NACK,
    /// timeout, device gone).  `recv` contents are unspecified on error.
    fn transfer(&mut self, send: &[u8], recv: &mut [u8]) -> Result<(), BeaconError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockBus {
        id: String,
        fill: u8,
    }

    impl BusTransfer for MockBus {
        fn id(&self) -> &str {
            &self.id
        }

        fn transfer(&mut self, _send: &[u8], recv: &mut [u8]) -> Result<(), BeaconError> {
            recv.fill(self.fill);
            Ok(())
        }
    }

    #[test]
    fn mock_bus_fills_receive_buffer() {
        let mut bus = MockBus {
            id: "mock".to_string(),
            fill: 0xAB,
        };
        assert_eq!(bus.id(), "mock");
        assert!(bus.init().is_ok());

        let mut buf = [0u8; 4];
        bus.transfer(&[], &mut buf).unwrap();
        assert_eq!(buf, [0xAB; 4]);
    }
}
