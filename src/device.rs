use std::time::{Duration, Instant};

use crate::{Error, Result};
use crate::channels::ChannelBank;
use crate::config::{DeviceConfig, Gain, InputMode, IrqMode, Polarity, DUMMY_READS_MAX};
use crate::convert::Sequencer;
use crate::regs;
use crate::sample::Sample;
use crate::scan::Scanner;
use crate::sink::{BufferSink, SinkPolicy};
use crate::sys::BusPort;

/// Upper bound on the fix-mode completion wait.
const FIX_SCAN_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct Device<P: BusPort> {
    port: P,
    channels: ChannelBank,
    scanner: Scanner,
    input_mode: InputMode,
    dummy_reads: u8,
}

impl Device<crate::sys::imp::UioPort> {
    /// Opens the module through the UIO driver at `device_path`.
    pub fn open(device_path: &str, config: &DeviceConfig) -> Result<Device<crate::sys::imp::UioPort>> {
        let port = crate::sys::imp::UioPort::new(device_path)?;
        Device::new(port, config)
    }
}

impl<P: BusPort> Device<P> {
    /// Initializes the driver state from `config` and brings the hardware to
    /// its idle state: channel 0 selected, interrupts disabled.
    pub fn new(mut port: P, config: &DeviceConfig) -> Result<Device<P>> {
        if config.dummy_reads > DUMMY_READS_MAX {
            return Err(Error::InvalidParameter("dummy read count out of range"));
        }
        if config.check_identity {
            let magic = port.read_id(0)?;
            let module = port.read_id(1)?;
            if magic != regs::ID_MAGIC || !regs::ID_MODULE_TYPES.contains(&module) {
                log::debug!("identity rejected: magic={:#06x} module={}", magic, module);
                return Err(Error::BadIdentity { magic, module });
            }
        }
        let mut device = Device {
            port,
            channels: ChannelBank::new(config.input_mode, &config.channels),
            scanner: Scanner::new(config.irq_mode),
            input_mode: config.input_mode,
            dummy_reads: config.dummy_reads,
        };
        device.port.write_reg(regs::REG_CTRL, device.channels.word(0).bits())?;
        let id = device.port.read_reg(regs::REG_ID)?;
        let id = if config.suppress_bus_error {
            id | regs::ID_BUSERR_SUPPRESS
        } else {
            id & !regs::ID_BUSERR_SUPPRESS
        };
        device.port.write_reg(regs::REG_ID, id)?;
        Ok(device)
    }

    /// Writes the idle control word, taking the interrupt latch down with it.
    pub fn teardown(&mut self) -> Result<()> {
        log::debug!("teardown()");
        self.channels.set_irq_enabled(false);
        self.scanner.reset();
        self.port.write_reg(regs::REG_CTRL, 0)
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn channel_count(&self) -> usize {
        self.channels.channel_count()
    }

    pub fn set_gain(&mut self, ch: usize, gain: Gain) -> Result<()> {
        log::debug!("set_gain(ch={}, {:?})", ch, gain);
        self.channels.set_gain(ch, gain)?;
        self.port.write_reg(regs::REG_CTRL, self.channels.word(ch).bits())
    }

    pub fn gain(&self, ch: usize) -> Result<Gain> {
        self.channels.gain(ch)
    }

    pub fn set_polarity(&mut self, ch: usize, polarity: Polarity) -> Result<()> {
        log::debug!("set_polarity(ch={}, {:?})", ch, polarity);
        self.channels.set_polarity(ch, polarity)?;
        self.port.write_reg(regs::REG_CTRL, self.channels.word(ch).bits())
    }

    pub fn polarity(&self, ch: usize) -> Result<Polarity> {
        self.channels.polarity(ch)
    }

    pub fn set_scan_enabled(&mut self, ch: usize, on: bool) -> Result<()> {
        log::debug!("set_scan_enabled(ch={}, {})", ch, on);
        if self.channels.set_scan_enabled(ch, on)? {
            // the set of scanned channels changed under the sweep position
            self.scanner.reset_sweep();
        }
        Ok(())
    }

    pub fn scan_enabled(&self, ch: usize) -> Result<bool> {
        self.channels.scan_enabled(ch)
    }

    pub fn enabled_count(&self) -> usize {
        self.channels.enabled_count()
    }

    pub fn set_dummy_reads(&mut self, count: u8) -> Result<()> {
        if count > DUMMY_READS_MAX {
            return Err(Error::InvalidParameter("dummy read count out of range"));
        }
        self.dummy_reads = count;
        Ok(())
    }

    pub fn dummy_reads(&self) -> u8 {
        self.dummy_reads
    }

    pub fn set_irq_mode(&mut self, mode: IrqMode) {
        log::debug!("set_irq_mode({:?})", mode);
        self.scanner.set_mode(mode);
    }

    pub fn irq_mode(&self) -> IrqMode {
        self.scanner.mode()
    }

    pub fn irq_enabled(&self) -> bool {
        self.channels.irq_enabled()
    }

    pub fn irq_count(&self) -> u32 {
        self.scanner.irq_count()
    }

    pub fn set_irq_count(&mut self, count: u32) {
        self.scanner.set_irq_count(count);
    }

    /// Raise or drop the interrupt latch.
    ///
    /// In the `Legacy` and `PerChannel` modes the latch is entirely
    /// caller-managed. The auto modes manage it themselves; there an enable
    /// request is ignored, while a disable is honored so a timed-out fix
    /// scan can be recovered.
    pub fn set_irq_enabled(&mut self, enabled: bool) -> Result<()> {
        log::debug!("set_irq_enabled({})", enabled);
        match self.scanner.mode() {
            IrqMode::Legacy | IrqMode::PerChannel => {}
            IrqMode::PerChannelAuto | IrqMode::Fix => {
                if enabled {
                    log::debug!("enable ignored; this mode manages the latch itself");
                    return Ok(());
                }
            }
        }
        self.channels.set_irq_enabled(enabled);
        self.scanner.reset_sweep();
        self.port.write_reg(regs::REG_CTRL, self.channels.word(0).bits())
    }

    /// One converted value from channel `ch`, synchronously.
    ///
    /// Refused while the interrupt latch is up: a manual conversion would
    /// race the interrupt handler's channel selection.
    pub fn read(&mut self, ch: usize) -> Result<Sample> {
        log::debug!("read(ch={})", ch);
        if self.channels.irq_enabled() {
            return Err(Error::ReadRejected);
        }
        self.channels.scan_enabled(ch)?; // bounds check only
        Sequencer { port: &mut self.port, dummy_reads: self.dummy_reads }
            .sample(self.channels.word(ch))
    }

    /// Level of the external pin; starts no conversion.
    pub fn read_external_pin(&mut self) -> Result<bool> {
        Sequencer { port: &mut self.port, dummy_reads: self.dummy_reads }
            .read_external_pin()
    }

    /// Fill `words` from the start of the module identity PROM.
    pub fn read_identity(&mut self, words: &mut [u16]) -> Result<()> {
        for (index, word) in words.iter_mut().enumerate() {
            *word = self.port.read_id(index)?;
        }
        Ok(())
    }

    /// Interrupt service entry point. The surrounding platform invokes this
    /// once per hardware interrupt, passing the sink samples are routed to.
    pub fn service_interrupt(&mut self, sink: &mut dyn BufferSink) -> Result<()> {
        self.scanner.service(&mut self.port, &mut self.channels, self.dummy_reads, sink)
    }

    /// Read a block of samples; `buf.len()` is the requested word count.
    ///
    /// Under the `UserControlled` sink policy the channels are sampled
    /// synchronously into `buf`. Under the buffered policies the request is
    /// validated against the active mode, the engine is armed if the mode
    /// calls for it, and whatever the sink already holds is drained into
    /// `buf`. In `Fix` mode the call arms a full-channel sweep and blocks
    /// until it completes or the wait times out.
    pub fn block_read(&mut self, sink: &mut dyn BufferSink, buf: &mut [u16]) -> Result<usize> {
        log::debug!("block_read({} words)", buf.len());
        if self.scanner.mode() == IrqMode::Fix {
            return self.block_read_fix(sink, buf);
        }
        if sink.policy() == SinkPolicy::UserControlled {
            return self.direct_scan(buf);
        }
        match self.scanner.mode() {
            IrqMode::PerChannel | IrqMode::PerChannelAuto => {
                let enabled = self.channels.enabled_count();
                if enabled == 0 {
                    return Err(Error::NoChannelConfigured);
                }
                if buf.len() % enabled != 0 {
                    return Err(Error::InvalidParameter(
                        "block read must request whole sweeps"));
                }
                if self.scanner.mode() == IrqMode::PerChannelAuto {
                    if sink.policy() == SinkPolicy::CurrentOnly {
                        return Err(Error::UnsupportedConfiguration(
                            "a current-only sink cannot track sweep completion"));
                    }
                    if self.scanner.in_progress() {
                        return Err(Error::Busy);
                    }
                    self.scanner.arm_auto(buf.len());
                    self.channels.set_irq_enabled(true);
                    self.port.write_reg(regs::REG_CTRL, self.channels.word(0).bits())?;
                } else {
                    self.scanner.arm_block(buf.len());
                }
            }
            IrqMode::Legacy => {}
            IrqMode::Fix => unreachable!(),
        }
        sink.direct_read(buf)
    }

    /// Synchronous scan of the enabled channels into `buf`, ascending from
    /// channel 0 with wraparound.
    fn direct_scan(&mut self, buf: &mut [u16]) -> Result<usize> {
        if self.channels.irq_enabled() {
            return Err(Error::ReadRejected);
        }
        let mut filled = 0;
        let mut ch = 0;
        let mut sampled_any = false;
        while filled < buf.len() {
            if self.channels.is_scanned(ch) {
                let sample = Sequencer { port: &mut self.port, dummy_reads: self.dummy_reads }
                    .sample(self.channels.word(ch))?;
                buf[filled] = sample.raw();
                filled += 1;
                sampled_any = true;
            }
            ch += 1;
            if ch == self.channels.channel_count() {
                ch = 0;
                if !sampled_any {
                    return Err(Error::NoChannelConfigured);
                }
            }
        }
        Ok(filled)
    }

    /// Arm a fix-mode sweep and pump the interrupt service until it
    /// completes. A timeout leaves the interrupt latch up; the caller must
    /// drop it with `set_irq_enabled(false)` before re-arming.
    fn block_read_fix(&mut self, sink: &mut dyn BufferSink, buf: &mut [u16]) -> Result<usize> {
        let count = self.channels.channel_count();
        if buf.len() != count {
            return Err(Error::InvalidParameter("fix-mode read must cover every channel"));
        }
        if self.channels.irq_enabled() {
            return Err(Error::Busy);
        }
        self.scanner.arm_fix(count);
        self.channels.set_irq_enabled(true);
        self.port.write_reg(regs::REG_CTRL_START, self.channels.word(0).bits())?;
        let deadline = Instant::now() + FIX_SCAN_TIMEOUT;
        while !self.scanner.is_complete() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.port.wait_interrupt(remaining)? {
                log::warn!("fix scan timed out; interrupt latch left up");
                return Err(Error::WaitTimeout);
            }
            self.service_interrupt(sink)?;
        }
        self.scanner.take_sweep(buf);
        Ok(buf.len())
    }
}
