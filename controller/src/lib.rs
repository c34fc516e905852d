// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Control of pluggable SFP, QSFP and QSFP28-DD transceivers.
//!
//! Every cage is described by a [`config::DeviceConfig`], from which a
//! family driver is built. Drivers implement [`media::MediaControl`], and
//! upper layers talk to them through the functions of the [`media`] module,
//! which check the kind of resource they are handed and log failures.
//!
//! All operations are synchronous and block the calling thread. The only
//! shared state between cages is the set of GPIO pin groups used to route
//! the I2C bus to a module, which are held for the whole of an operation
//! through a [`selection::Selection`] guard.

pub mod aquantia;
pub mod bus;
pub mod config;
pub mod copper;
pub mod eeprom;
pub mod gpio;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod mailbox;
pub mod media;
pub mod qsfp;
pub mod qsfp_dd;
pub mod selection;
pub mod sfp;
pub mod sim;
pub mod tuning;

pub use bus::Bus;
pub use bus::BusError;
pub use bus::I2cBus;
pub use config::DeviceConfig;
pub use config::DeviceConfigBuilder;
pub use config::PortType;
pub use gpio::GpioError;
pub use gpio::PinGroup;
pub use gpio::PinGroupHandle;
pub use gpio::PinGroupRegistry;
pub use media::MediaControl;
pub use media::Resource;
pub use qsfp::Qsfp;
pub use qsfp_dd::QsfpDD;
pub use sfp::Sfp;

use media_decode::Error as DecodeError;
use media_messages::Error as MessageError;
use std::time::Duration;

#[usdt::provider(provider = "xcvr_media")]
mod probes {
    // Fires when a page is written to a device's page select byte.
    fn page__select(_: u8, _: u8) {}

    // Fires when a mailbox packet has been written to a module.
    fn mailbox__packet__start(_: u8, _: u16, _: u8) {}

    // Fires when a mailbox packet completes, with the data read or written.
    fn mailbox__packet__done(_: u8, _: u16, _: u16) {}
}

/// An error controlling a transceiver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The module or driver lacks the capability. This is an expected
    /// outcome when probing features, not a failure.
    #[error("Operation not supported")]
    NotSupported,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Bus failure at address {address:#04x} offset {offset:#04x}")]
    Bus {
        address: u8,
        offset: u8,
        #[source]
        source: BusError,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("GPIO failure on pin group '{group}'")]
    Gpio {
        group: String,
        #[source]
        source: GpioError,
    },

    #[error("Operation is not implemented: {0}")]
    Unimplemented(&'static str),

    #[error("Mailbox chain failed at packet {index}")]
    ChainFailed {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("No module is present")]
    NotPresent,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Decode error")]
    Decode(#[from] DecodeError),

    #[error("Message error")]
    Message(MessageError),
}

impl Error {
    /// Return true if this reports a missing capability rather than a
    /// failure. A failed mailbox chain reports the error of its packet.
    pub fn is_not_supported(&self) -> bool {
        match self {
            Error::NotSupported => true,
            Error::ChainFailed { source, .. } => source.is_not_supported(),
            _ => false,
        }
    }
}

impl From<MessageError> for Error {
    fn from(e: MessageError) -> Self {
        match e {
            MessageError::InvalidPage(_) | MessageError::InvalidDeviceAddress(_) => {
                Error::InvalidArgument(e.to_string())
            }
            other => Error::Message(other),
        }
    }
}

/// Return an `InvalidArgument` error for a channel outside `0..channels`.
pub(crate) fn check_channel(channel: u8, channels: u8) -> Result<(), Error> {
    if channel < channels {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "channel {channel} out of range, module has {channels}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::check_channel;
    use super::Error;
    use media_messages::Error as MessageError;

    #[test]
    fn test_bad_address_selectors_are_invalid_arguments() {
        let e = Error::from(MessageError::InvalidPage(-4));
        assert!(matches!(e, Error::InvalidArgument(_)));
        let e = Error::from(MessageError::InvalidDeviceAddress(0x90));
        assert!(matches!(e, Error::InvalidArgument(_)));
        let e = Error::from(MessageError::InvalidMailboxOp(3));
        assert!(matches!(e, Error::Message(MessageError::InvalidMailboxOp(3))));
    }

    #[test]
    fn test_not_supported_through_chain() {
        assert!(Error::NotSupported.is_not_supported());
        let chained = Error::ChainFailed {
            index: 1,
            source: Box::new(Error::NotSupported),
        };
        assert!(chained.is_not_supported());
        assert!(!Error::NotPresent.is_not_supported());
    }

    #[test]
    fn test_check_channel() {
        assert!(check_channel(3, 4).is_ok());
        assert!(matches!(check_channel(4, 4), Err(Error::InvalidArgument(_))));
    }
}
