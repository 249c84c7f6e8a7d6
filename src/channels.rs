use crate::{Error, Result};
use crate::config::{ChannelConfig, Gain, InputMode, Polarity, MAX_CHANNELS};
use crate::regs::Control;

/// Shadow of the per-channel control words plus the scan schedule.
///
/// The interrupt-enable bit is a device-global latch; it is kept identical
/// across all channel words at all times.
#[derive(Debug)]
pub(crate) struct ChannelBank {
    words: [Control; MAX_CHANNELS],
    scan: [bool; MAX_CHANNELS],
    count: usize,
    enabled: usize,
    irq_enabled: bool,
}

impl ChannelBank {
    pub fn new(mode: InputMode, channels: &[ChannelConfig; MAX_CHANNELS]) -> ChannelBank {
        let count = mode.channel_count();
        let mut words = [Control::empty(); MAX_CHANNELS];
        let mut scan = [false; MAX_CHANNELS];
        let mut enabled = 0;
        for ch in 0..count {
            let config = &channels[ch];
            words[ch] = Control::for_channel(ch).with_gain_code(config.gain.code());
            words[ch].set(Control::Bipolar, config.polarity == Polarity::Bipolar);
            scan[ch] = config.scan_enabled;
            if config.scan_enabled {
                enabled += 1;
            }
        }
        ChannelBank { words, scan, count, enabled, irq_enabled: false }
    }

    fn check(&self, ch: usize) -> Result<()> {
        if ch < self.count {
            Ok(())
        } else {
            Err(Error::InvalidParameter("channel index out of range"))
        }
    }

    pub fn channel_count(&self) -> usize {
        self.count
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    /// Control word of a known-valid channel index.
    pub fn word(&self, ch: usize) -> Control {
        self.words[ch]
    }

    /// Scan flag of a known-valid channel index.
    pub fn is_scanned(&self, ch: usize) -> bool {
        self.scan[ch]
    }

    pub fn set_gain(&mut self, ch: usize, gain: Gain) -> Result<()> {
        self.check(ch)?;
        self.words[ch] = self.words[ch].with_gain_code(gain.code());
        Ok(())
    }

    pub fn gain(&self, ch: usize) -> Result<Gain> {
        self.check(ch)?;
        Ok(Gain::from_wire(self.words[ch].gain_code()))
    }

    pub fn set_polarity(&mut self, ch: usize, polarity: Polarity) -> Result<()> {
        self.check(ch)?;
        self.words[ch].set(Control::Bipolar, polarity == Polarity::Bipolar);
        Ok(())
    }

    pub fn polarity(&self, ch: usize) -> Result<Polarity> {
        self.check(ch)?;
        Ok(if self.words[ch].contains(Control::Bipolar) {
            Polarity::Bipolar
        } else {
            Polarity::Unipolar
        })
    }

    /// Returns whether the flag actually changed; the enabled count is only
    /// touched on a real transition.
    pub fn set_scan_enabled(&mut self, ch: usize, on: bool) -> Result<bool> {
        self.check(ch)?;
        if self.scan[ch] == on {
            return Ok(false);
        }
        self.scan[ch] = on;
        if on {
            self.enabled += 1;
        } else {
            self.enabled -= 1;
        }
        Ok(true)
    }

    pub fn scan_enabled(&self, ch: usize) -> Result<bool> {
        self.check(ch)?;
        Ok(self.scan[ch])
    }

    pub fn set_irq_enabled(&mut self, on: bool) {
        self.irq_enabled = on;
        for ch in 0..self.count {
            self.words[ch].set(Control::IrqEnable, on);
        }
    }
}
