use crate::Result;
use crate::regs::{self, Control};
use crate::sample::Sample;
use crate::sys::BusPort;

/// Executes the settle-then-sample protocol for one channel.
///
/// The multiplexer switches with a delay after a channel or gain change, so
/// the first conversion after a control-word write is unreliable and must be
/// discarded. `dummy_reads` adds further discarded conversions for slow
/// external circuitry.
///
/// Not reentrant: must not run concurrently with another sequencer call on
/// the same device.
pub(crate) struct Sequencer<'a, P: BusPort> {
    pub port: &'a mut P,
    pub dummy_reads: u8,
}

impl<'a, P: BusPort> Sequencer<'a, P> {
    /// Select the channel described by `word`, let the multiplexer settle,
    /// and return one converted value.
    pub fn sample(&mut self, word: Control) -> Result<Sample> {
        self.port.write_reg(regs::REG_CTRL, word.bits())?;
        for _ in 0..=self.dummy_reads {
            self.port.read_reg(regs::REG_DATA_START)?;
        }
        let value = self.port.read_reg(regs::REG_DATA_START)?;
        log::trace!("sample(ch={}) = {:#06x}", word.channel(), value);
        Ok(Sample::from_raw(value))
    }

    /// One conversion with the value dropped; clears a pending interrupt
    /// cause without producing data.
    pub fn discard(&mut self) -> Result<()> {
        self.port.read_reg(regs::REG_DATA_START)?;
        Ok(())
    }

    /// Level of the external pin. Reads the plain data register and starts
    /// no conversion, so an in-progress scan is not disturbed.
    pub fn read_external_pin(&mut self) -> Result<bool> {
        let value = self.port.read_reg(regs::REG_DATA)?;
        Ok(value & 0x0002 != 0)
    }
}
