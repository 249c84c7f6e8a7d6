mod sys;
mod regs;
mod config;
mod sample;
mod channels;
mod convert;
mod sink;
mod scan;
mod device;

#[cfg(test)]
mod sim;

#[derive(Debug)]
pub enum Error {
    NotFound,
    BusIo(std::io::Error),
    BadIdentity { magic: u16, module: u16 },
    InvalidParameter(&'static str),
    ReadRejected,
    NoChannelConfigured,
    BufferUnavailable,
    WaitTimeout,
    UnsupportedConfiguration(&'static str),
    Busy,
    Other(Box<dyn std::error::Error + Sync + Send + 'static>),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::NotFound =>
                write!(f, "module not present"),
            Self::BusIo(io_error) =>
                write!(f, "bus I/O error: {}", io_error),
            Self::BadIdentity { magic, module } =>
                write!(f, "identity mismatch: magic {:#06x}, module type {}", magic, module),
            Self::InvalidParameter(what) =>
                write!(f, "invalid parameter: {}", what),
            Self::ReadRejected =>
                write!(f, "synchronous read rejected while interrupts are enabled"),
            Self::NoChannelConfigured =>
                write!(f, "no channel configured for scanning"),
            Self::BufferUnavailable =>
                write!(f, "no buffer space available"),
            Self::WaitTimeout =>
                write!(f, "timed out waiting for scan completion"),
            Self::UnsupportedConfiguration(what) =>
                write!(f, "unsupported configuration: {}", what),
            Self::Busy =>
                write!(f, "a scan is already armed"),
            Self::Other(error) =>
                write!(f, "{}", error),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            &Self::BusIo(ref io_error) => Some(io_error),
            _ => None
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::NotFound =>
                Self::new(io::ErrorKind::NotFound, error),
            Error::BusIo(io_error) =>
                io_error,
            Error::WaitTimeout =>
                Self::new(io::ErrorKind::TimedOut, error),
            Error::Other(error) => {
                match error.downcast::<std::io::Error>() {
                    Ok(error) => *error,
                    Err(error) => std::io::Error::new(io::ErrorKind::Other, error)
                }
            }
            error =>
                Self::new(io::ErrorKind::Other, error),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(error) => error,
            Err(error) => Error::BusIo(error),
        }
    }
}

pub type Result<T> =
    core::result::Result<T, Error>;

use std::io;

pub use config::{
    Gain,
    Polarity,
    InputMode,
    IrqMode,
    ChannelConfig,
    DeviceConfig,
    MAX_CHANNELS,
    DUMMY_READS_MAX,
};

pub use sample::{
    Sample,
    Resolution,
};

pub use sink::{
    BufferSink,
    SinkPolicy,
};

pub use sys::BusPort;
pub use sys::imp::UioPort;

pub use device::Device;

pub type UioDevice =
    device::Device<crate::sys::imp::UioPort>;
