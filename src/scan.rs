use crate::{Error, Result};
use crate::channels::ChannelBank;
use crate::config::IrqMode;
use crate::convert::Sequencer;
use crate::regs;
use crate::sink::BufferSink;
use crate::sys::BusPort;

/// Position within an interrupt-driven sweep.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    channel: usize,
    read_this_sweep: usize,
}

/// Bookkeeping for a block read spanning several sweeps.
#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    requested: usize,
    produced: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    InProgress,
    Complete,
}

/// The interrupt-driven acquisition engine.
///
/// One instance per device, driven by `service` from the platform's
/// interrupt callback. Which of the four strategies runs is selected by the
/// interrupt mode; the cursor and progress counters only carry meaning while
/// a sweep is underway and are reset on completion, abort, and
/// reconfiguration.
#[derive(Debug)]
pub(crate) struct Scanner {
    mode: IrqMode,
    phase: Phase,
    cursor: Cursor,
    progress: Progress,
    skip: bool,
    sweep: Vec<u16>,
    irq_count: u32,
}

impl Scanner {
    pub fn new(mode: IrqMode) -> Scanner {
        Scanner {
            mode,
            phase: Phase::Idle,
            cursor: Cursor::default(),
            progress: Progress::default(),
            skip: false,
            sweep: Vec::new(),
            irq_count: 0,
        }
    }

    pub fn mode(&self) -> IrqMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: IrqMode) {
        self.mode = mode;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.cursor = Cursor::default();
        self.progress = Progress::default();
        self.skip = false;
        self.sweep.clear();
    }

    /// Restart the sweep position; used whenever the scanned-channel set or
    /// the interrupt latch changes under the engine.
    pub fn reset_sweep(&mut self) {
        self.cursor = Cursor::default();
    }

    pub fn in_progress(&self) -> bool {
        self.phase == Phase::InProgress
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn irq_count(&self) -> u32 {
        self.irq_count
    }

    pub fn set_irq_count(&mut self, count: u32) {
        self.irq_count = count;
    }

    /// Record a block-read request of `words` against the sweep counters.
    pub fn arm_block(&mut self, words: usize) {
        self.progress = Progress { requested: words, produced: 0 };
    }

    /// Arm a block read that manages the interrupt latch itself.
    pub fn arm_auto(&mut self, words: usize) {
        self.arm_block(words);
        self.reset_sweep();
        self.phase = Phase::InProgress;
    }

    /// Arm a full-channel sweep into the internal flat buffer. The first
    /// interrupt only clears the conversion already pending from arming.
    pub fn arm_fix(&mut self, channels: usize) {
        self.arm_block(channels);
        self.reset_sweep();
        self.skip = true;
        self.sweep.clear();
        self.sweep.resize(channels, 0);
        self.phase = Phase::InProgress;
    }

    /// Copy the completed fix-mode sweep out and return to idle.
    pub fn take_sweep(&mut self, buf: &mut [u16]) {
        debug_assert_eq!(buf.len(), self.sweep.len());
        buf.copy_from_slice(&self.sweep);
        self.reset();
    }

    /// Interrupt service entry point, one invocation per hardware interrupt.
    pub fn service<P: BusPort>(&mut self, port: &mut P, bank: &mut ChannelBank,
                               dummy_reads: u8, sink: &mut dyn BufferSink) -> Result<()> {
        self.irq_count = self.irq_count.wrapping_add(1);
        match self.mode {
            IrqMode::Legacy =>
                self.service_legacy(port, bank, dummy_reads, sink),
            IrqMode::PerChannel | IrqMode::PerChannelAuto =>
                self.service_per_channel(port, bank, dummy_reads, sink),
            IrqMode::Fix =>
                self.service_fix(port, bank),
        }
    }

    /// Legacy strategy: one complete sweep per interrupt.
    fn service_legacy<P: BusPort>(&mut self, port: &mut P, bank: &mut ChannelBank,
                                  dummy_reads: u8, sink: &mut dyn BufferSink) -> Result<()> {
        let need = bank.enabled_count();
        if need == 0 {
            log::trace!("interrupt with no channel scanned; disabling the latch");
            return self.disable_irq(port, bank);
        }
        let Some(mut slots) = sink.reserve(need) else {
            // sink full: clear the interrupt cause and let the reader catch up
            log::trace!("no buffer space, discarding one conversion");
            return Sequencer { port, dummy_reads }.discard();
        };
        let mut filled = 0;
        let mut produced = 0;
        let mut starved = false;
        for ch in 0..bank.channel_count() {
            if !bank.is_scanned(ch) {
                continue;
            }
            let sample = Sequencer { port: &mut *port, dummy_reads }.sample(bank.word(ch))?;
            slots[filled] = sample.raw();
            filled += 1;
            produced += 1;
            if produced == need {
                break;
            }
            if filled == slots.len() {
                match sink.reserve(need - produced) {
                    Some(next) => {
                        slots = next;
                        filled = 0;
                    }
                    None => {
                        starved = true;
                        break;
                    }
                }
            }
        }
        sink.mark_ready();
        if starved {
            log::trace!("sweep aborted after {} of {} words", produced, need);
            return Err(Error::BufferUnavailable);
        }
        Ok(())
    }

    /// Per-channel strategy: exactly one scanned channel per interrupt.
    fn service_per_channel<P: BusPort>(&mut self, port: &mut P, bank: &mut ChannelBank,
                                       dummy_reads: u8, sink: &mut dyn BufferSink) -> Result<()> {
        let enabled = bank.enabled_count();
        if enabled == 0 {
            log::trace!("interrupt with no channel scanned; disabling the latch");
            return self.disable_irq(port, bank);
        }
        let Some(slot) = sink.reserve(1) else {
            log::trace!("no buffer space, discarding one conversion");
            return Sequencer { port, dummy_reads }.discard();
        };
        while !bank.is_scanned(self.cursor.channel) {
            self.cursor.channel = (self.cursor.channel + 1) % bank.channel_count();
        }
        let ch = self.cursor.channel;
        let sample = Sequencer { port: &mut *port, dummy_reads }.sample(bank.word(ch))?;
        slot[0] = sample.raw();
        self.cursor.channel = (ch + 1) % bank.channel_count();
        self.cursor.read_this_sweep += 1;
        if self.cursor.read_this_sweep == enabled {
            sink.mark_ready();
            self.cursor = Cursor::default();
            self.progress.produced += enabled;
            if self.mode == IrqMode::PerChannelAuto
                    && self.progress.produced == self.progress.requested {
                log::trace!("block read complete ({} words)", self.progress.produced);
                self.phase = Phase::Complete;
                return self.disable_irq(port, bank);
            }
        }
        Ok(())
    }

    /// Fix strategy: self-sustaining full-channel sweep. Every interrupt
    /// both fetches the previous conversion and starts the next one, so no
    /// external trigger is needed once armed.
    fn service_fix<P: BusPort>(&mut self, port: &mut P, bank: &mut ChannelBank) -> Result<()> {
        if self.phase != Phase::InProgress {
            // spurious interrupt: clear the pending conversion
            port.read_reg(regs::REG_DATA_START)?;
            return Ok(());
        }
        if self.skip {
            // the conversion pending from arming ran right after the channel
            // switch; its value is unreliable
            port.read_reg(regs::REG_DATA_INC_START)?;
            self.skip = false;
            return Ok(());
        }
        let value = port.read_reg(regs::REG_DATA_INC_START)?;
        self.sweep[self.cursor.channel] = value;
        if self.cursor.channel + 1 < bank.channel_count() {
            self.cursor.channel += 1;
            Ok(())
        } else {
            log::trace!("fix sweep complete");
            self.phase = Phase::Complete;
            self.disable_irq(port, bank)
        }
    }

    fn disable_irq<P: BusPort>(&mut self, port: &mut P, bank: &mut ChannelBank) -> Result<()> {
        bank.set_irq_enabled(false);
        port.write_reg(regs::REG_CTRL, bank.word(self.cursor.channel).bits())
    }
}
