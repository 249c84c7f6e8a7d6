use std::ffi::{CStr, CString};
use std::io;
use std::time::Duration;
use libc::{c_int, c_void};
use crate::{Error, Result};
use crate::regs::ID_PROM_WORDS;

/// Size of the register window exposed by the carrier, in bytes.
const REG_WINDOW_LEN: usize = 0x100;

#[derive(Debug)]
struct Fd(c_int);

impl Fd {
    fn open(path: &CStr) -> io::Result<Fd> {
        unsafe {
            let fd = libc::open(path.as_ptr(), libc::O_RDWR);
            if fd == -1 {
                Err(io::Error::last_os_error())
            } else {
                Ok(Fd(fd))
            }
        }
    }

    fn poll_in(&self, timeout: Duration) -> io::Result<bool> {
        let mut pollfd = libc::pollfd { fd: self.0, events: libc::POLLIN, revents: 0 };
        let millis = timeout.as_millis().min(c_int::MAX as u128) as c_int;
        let ready = unsafe { libc::poll(&mut pollfd, 1, millis) };
        if ready == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ready > 0)
        }
    }

    fn read_u32(&self) -> io::Result<u32> {
        let mut bytes = [0u8; 4];
        let count = unsafe {
            libc::read(self.0, bytes.as_mut_ptr() as *mut c_void, bytes.len())
        };
        if count != bytes.len() as isize {
            Err(io::Error::last_os_error())
        } else {
            Ok(u32::from_ne_bytes(bytes))
        }
    }

    fn write_u32(&self, value: u32) -> io::Result<()> {
        let bytes = value.to_ne_bytes();
        let count = unsafe {
            libc::write(self.0, bytes.as_ptr() as *const c_void, bytes.len())
        };
        if count != bytes.len() as isize {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        unsafe {
            if libc::close(self.0) == -1 {
                panic!("error closing fd: {}", io::Error::last_os_error())
            }
        }
    }
}

fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

#[derive(Debug)]
struct Mapping {
    ptr: *mut u8,
    len: usize,
}

impl Mapping {
    /// Map UIO region `index`; UIO places region N at offset N pages.
    fn new(fd: &Fd, index: usize, len: usize) -> io::Result<Mapping> {
        let offset = (index * page_size()) as libc::off_t;
        let ptr = unsafe {
            libc::mmap(core::ptr::null_mut(), len,
                       libc::PROT_READ | libc::PROT_WRITE, libc::MAP_SHARED,
                       fd.0, offset)
        };
        if ptr == libc::MAP_FAILED {
            Err(io::Error::last_os_error())
        } else {
            Ok(Mapping { ptr: ptr as *mut u8, len })
        }
    }

    fn read_u16(&self, offset: usize) -> u16 {
        assert!(offset + 2 <= self.len);
        // SAFETY: In bounds of the mapping, which lives as long as `self`.
        unsafe { (self.ptr.add(offset) as *const u16).read_volatile() }
    }

    fn write_u16(&self, offset: usize, value: u16) {
        assert!(offset + 2 <= self.len);
        // SAFETY: In bounds of the mapping, which lives as long as `self`.
        unsafe { (self.ptr.add(offset) as *mut u16).write_volatile(value) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: Mapped with the same parameters in `Self::new`.
        let result = unsafe { libc::munmap(self.ptr as *mut c_void, self.len) };
        assert!(result == 0, "failed to unmap register window: {}",
                io::Error::last_os_error());
    }
}

/// Register access through a UIO device node. Region 0 is the register
/// window; region 1, when the carrier provides it, is the identity PROM.
#[derive(Debug)]
pub struct UioPort {
    fd: Fd,
    regs: Mapping,
    id_prom: Option<Mapping>,
}

// SAFETY: The mappings are exclusively owned; conceptually the same as
// holding a `Box<[u16]>` over device memory.
unsafe impl Send for UioPort {}

impl UioPort {
    pub fn new(device_path: &str) -> Result<UioPort> {
        let path = CString::new(device_path.to_owned()).unwrap();
        let fd = Fd::open(path.as_ref())?;
        let regs = Mapping::new(&fd, 0, REG_WINDOW_LEN)?;
        let id_prom = Mapping::new(&fd, 1, ID_PROM_WORDS * 2).ok();
        if id_prom.is_none() {
            log::debug!("no identity PROM mapping at {}", device_path);
        }
        Ok(UioPort { fd, regs, id_prom })
    }
}

impl super::BusPort for UioPort {
    fn read_reg(&mut self, offset: usize) -> Result<u16> {
        Ok(self.regs.read_u16(offset))
    }

    fn write_reg(&mut self, offset: usize, value: u16) -> Result<()> {
        self.regs.write_u16(offset, value);
        Ok(())
    }

    fn read_id(&mut self, index: usize) -> Result<u16> {
        if index >= ID_PROM_WORDS {
            return Err(Error::InvalidParameter("identity word index out of range"));
        }
        let id_prom = self.id_prom.as_ref().ok_or(Error::NotFound)?;
        Ok(id_prom.read_u16(index * 2))
    }

    fn wait_interrupt(&mut self, timeout: Duration) -> Result<bool> {
        // unmask first; the previous interrupt was left masked by its read
        self.fd.write_u32(1)?;
        if !self.fd.poll_in(timeout)? {
            return Ok(false);
        }
        self.fd.read_u32()?;
        Ok(true)
    }
}
