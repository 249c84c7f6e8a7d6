//! Simulated bus port and sample sink for the unit tests.
//!
//! The port models the externally observable behavior of the hardware: the
//! multiplexer needs one conversion to settle after a control-word change,
//! the start-read addresses return the running conversion, and the
//! increment addresses move the internal channel pointer.

use std::time::Duration;

use crate::Result;
use crate::regs::{self, ID_MAGIC, ID_PROM_WORDS,
                  REG_CTRL, REG_CTRL_START, REG_DATA_INC_START,
                  REG_DATA_START, REG_DATA_START_INC, REG_ID};
use crate::sink::{BufferSink, SinkPolicy};
use crate::sys::BusPort;

/// Marker returned for a conversion performed before the multiplexer
/// settled; carries the invalid bit.
pub const STALE: u16 = 0xfff1;

const SETTLE_MASK: u16 = 0x00ef; // channel, gain, polarity

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(usize),
    Write(usize, u16),
}

#[derive(Debug)]
pub struct SimPort {
    pub ctrl: u16,
    pub chan_ptr: usize,
    pub channel_count: usize,
    pub last: u16,
    pub settled: bool,
    pub pin: bool,
    pub irq_pending: bool,
    /// When false, `wait_interrupt` never fires; simulates a missing
    /// trigger or a wedged interrupt line.
    pub irq_wired: bool,
    pub modid: u16,
    pub id_words: [u16; ID_PROM_WORDS],
    pub log: Vec<Access>,
}

impl SimPort {
    pub fn new() -> SimPort {
        let mut id_words = [0; ID_PROM_WORDS];
        id_words[0] = ID_MAGIC;
        id_words[1] = 34;
        SimPort {
            ctrl: 0,
            chan_ptr: 0,
            channel_count: 16,
            last: 0,
            settled: true,
            pin: false,
            irq_pending: false,
            irq_wired: true,
            modid: 0,
            id_words,
            log: Vec::new(),
        }
    }

    /// The value a settled conversion of `ch` produces.
    pub fn value_for(&self, ch: usize) -> u16 {
        (((0x200 + ch) as u16) << 4) | if self.pin { 0x0002 } else { 0 }
    }

    fn convert(&mut self) -> u16 {
        self.irq_pending = true;
        if self.settled {
            self.value_for(self.chan_ptr)
        } else {
            self.settled = true;
            STALE
        }
    }

    fn advance(&mut self) {
        self.chan_ptr = (self.chan_ptr + 1) % self.channel_count;
    }

    fn apply_ctrl(&mut self, value: u16) {
        if (value ^ self.ctrl) & SETTLE_MASK != 0 {
            self.settled = false;
        }
        self.chan_ptr = (value & 0x000f) as usize;
        self.ctrl = value;
    }
}

impl BusPort for SimPort {
    fn read_reg(&mut self, offset: usize) -> Result<u16> {
        self.log.push(Access::Read(offset));
        let value = match offset {
            regs::REG_DATA => {
                (self.last & !0x0002) | if self.pin { 0x0002 } else { 0 }
            }
            REG_DATA_START => {
                let value = self.convert();
                self.last = value;
                value
            }
            REG_DATA_START_INC => {
                let value = self.convert();
                self.last = value;
                self.advance();
                value
            }
            REG_DATA_INC_START => {
                let previous = self.last;
                self.last = self.convert();
                self.advance();
                previous
            }
            REG_ID => self.modid,
            _ => panic!("unmapped register read at {:#04x}", offset),
        };
        Ok(value)
    }

    fn write_reg(&mut self, offset: usize, value: u16) -> Result<()> {
        self.log.push(Access::Write(offset, value));
        match offset {
            REG_CTRL => self.apply_ctrl(value),
            REG_CTRL_START => {
                self.apply_ctrl(value);
                self.last = self.convert();
            }
            REG_ID => self.modid = value,
            _ => panic!("unmapped register write at {:#04x}", offset),
        }
        Ok(())
    }

    fn read_id(&mut self, index: usize) -> Result<u16> {
        Ok(self.id_words[index])
    }

    fn wait_interrupt(&mut self, _timeout: Duration) -> Result<bool> {
        if self.irq_wired && self.irq_pending {
            self.irq_pending = false;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

/// Reservation-based sink with a fixed capacity, recording everything the
/// engines hand it.
#[derive(Debug)]
pub struct MockSink {
    pub policy: SinkPolicy,
    pub capacity: usize,
    pub storage: Vec<u16>,
    pub ready: usize,
}

impl MockSink {
    pub fn new(policy: SinkPolicy, capacity: usize) -> MockSink {
        MockSink { policy, capacity, storage: Vec::new(), ready: 0 }
    }
}

impl BufferSink for MockSink {
    fn policy(&self) -> SinkPolicy {
        self.policy
    }

    fn reserve(&mut self, words: usize) -> Option<&mut [u16]> {
        let free = self.capacity.saturating_sub(self.storage.len());
        if free == 0 || words == 0 {
            return None;
        }
        let take = words.min(free);
        let start = self.storage.len();
        self.storage.resize(start + take, 0);
        Some(&mut self.storage[start..])
    }

    fn mark_ready(&mut self) {
        self.ready = self.storage.len();
    }

    fn direct_read(&mut self, buf: &mut [u16]) -> Result<usize> {
        let count = buf.len().min(self.ready);
        buf[..count].copy_from_slice(&self.storage[..count]);
        Ok(count)
    }
}
