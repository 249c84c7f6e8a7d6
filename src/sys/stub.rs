use std::time::Duration;

use crate::Result;

#[derive(Debug)]
pub struct UioPort;

impl UioPort {
    pub fn new(_device_path: &str) -> Result<UioPort> {
        unimplemented!()
    }
}

impl super::BusPort for UioPort {
    fn read_reg(&mut self, _offset: usize) -> Result<u16> {
        unimplemented!()
    }

    fn write_reg(&mut self, _offset: usize, _value: u16) -> Result<()> {
        unimplemented!()
    }

    fn read_id(&mut self, _index: usize) -> Result<u16> {
        unimplemented!()
    }

    fn wait_interrupt(&mut self, _timeout: Duration) -> Result<bool> {
        unimplemented!()
    }
}
