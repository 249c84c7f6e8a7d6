//! High-level configuration of the module in terms of acquisition qualities.

use crate::{Error, Result};

/// Highest number of input channels the module can expose (single-ended fit).
pub const MAX_CHANNELS: usize = 16;

/// Upper bound on the configurable settle-conversion count.
pub const DUMMY_READS_MAX: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gain {
    #[default]
    X1,
    X2,
    X4,
    X8,
}

impl Gain {
    pub(crate) fn code(self) -> u16 {
        match self {
            Self::X1 => 0b00,
            Self::X2 => 0b01,
            Self::X4 => 0b10,
            Self::X8 => 0b11,
        }
    }

    pub(crate) fn from_wire(code: u16) -> Gain {
        match code {
            0b00 => Self::X1,
            0b01 => Self::X2,
            0b10 => Self::X4,
            0b11 => Self::X8,
            _ => unreachable!()
        }
    }

    pub fn from_code(code: u32) -> Result<Gain> {
        if code > 3 {
            return Err(Error::InvalidParameter("gain code out of range"));
        }
        Ok(Gain::from_wire(code as u16))
    }

    pub fn factor(self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    #[default]
    Unipolar,
    Bipolar,
}

impl Polarity {
    pub fn from_code(code: u32) -> Result<Polarity> {
        match code {
            0 => Ok(Self::Unipolar),
            1 => Ok(Self::Bipolar),
            _ => Err(Error::InvalidParameter("polarity code out of range")),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Unipolar => 0,
            Self::Bipolar => 1,
        }
    }
}

/// Input wiring of the module. Determines the channel count; must match
/// the fitted input circuitry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    SingleEnded,
    Differential,
}

impl InputMode {
    pub fn channel_count(self) -> usize {
        match self {
            Self::SingleEnded => 16,
            Self::Differential => 8,
        }
    }
}

/// Interrupt-driven acquisition strategy.
///
/// `Legacy` samples every scanned channel within one interrupt; the
/// per-channel modes spread a sweep over one interrupt per channel.
/// `PerChannelAuto` additionally manages the interrupt latch around a block
/// read. `Fix` always scans all physical channels into a flat buffer and is
/// the only mode that needs no external trigger signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrqMode {
    #[default]
    Legacy,
    PerChannel,
    PerChannelAuto,
    Fix,
}

impl IrqMode {
    pub fn from_code(code: u32) -> Result<IrqMode> {
        match code {
            0 => Ok(Self::Legacy),
            1 => Ok(Self::PerChannel),
            2 => Ok(Self::PerChannelAuto),
            3 => Ok(Self::Fix),
            _ => Err(Error::InvalidParameter("interrupt mode code out of range")),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Legacy => 0,
            Self::PerChannel => 1,
            Self::PerChannelAuto => 2,
            Self::Fix => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelConfig {
    pub gain: Gain,
    pub polarity: Polarity,
    /// Include this channel in interrupt-driven and block scans.
    pub scan_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    pub input_mode: InputMode,
    /// Additional settle conversions before every retained sample, on top of
    /// the one that is always performed.
    pub dummy_reads: u8,
    pub irq_mode: IrqMode,
    /// Verify the identity PROM magic and module type at initialization.
    pub check_identity: bool,
    /// Suppress the bus error raised when the module has no supply voltage.
    /// Requires the BI pin to be tied to ground.
    pub suppress_bus_error: bool,
    pub channels: [ChannelConfig; MAX_CHANNELS],
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            input_mode: Default::default(),
            dummy_reads: 0,
            irq_mode: Default::default(),
            check_identity: true,
            suppress_bus_error: false,
            channels: [ChannelConfig::default(); MAX_CHANNELS],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gain_codes() {
        for code in 0..4 {
            assert_eq!(Gain::from_code(code).unwrap().code(), code as u16);
        }
        assert!(matches!(Gain::from_code(4), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_polarity_codes() {
        assert_eq!(Polarity::from_code(0).unwrap(), Polarity::Unipolar);
        assert_eq!(Polarity::from_code(1).unwrap(), Polarity::Bipolar);
        assert!(matches!(Polarity::from_code(2), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_irq_mode_codes() {
        for code in 0..4 {
            assert_eq!(IrqMode::from_code(code).unwrap().code(), code);
        }
        assert!(matches!(IrqMode::from_code(4), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_channel_counts() {
        assert_eq!(InputMode::SingleEnded.channel_count(), 16);
        assert_eq!(InputMode::Differential.channel_count(), 8);
    }
}
