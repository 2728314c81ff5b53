use std::ffi::CStr;
use std::io;
use std::os::unix::io::RawFd;

use crate::client::protocol::port_handler::PortHandler;

/// Master side of a pseudo terminal. Whatever opens [`slave_path`] talks to
/// this port as if it were a serial line.
///
/// [`slave_path`]: VirtualUartPort::slave_path
#[derive(Debug)]
pub struct VirtualUartPort {
    master_fd: RawFd,
    slave_path: String,
}

fn would_block(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
        // no slave opened yet, or the last one just closed
        || err.raw_os_error() == Some(libc::EIO)
}

impl VirtualUartPort {
    pub fn new() -> io::Result<Self> {
        unsafe {
            let fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::grantpt(fd) != 0 || libc::unlockpt(fd) != 0 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(err);
            }

            let name_ptr = libc::ptsname(fd);
            if name_ptr.is_null() {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(err);
            }
            let slave_path = CStr::from_ptr(name_ptr).to_string_lossy().into_owned();

            let flags = libc::fcntl(fd, libc::F_GETFL);
            if flags >= 0 {
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            }

            let port = Self {
                master_fd: fd,
                slave_path,
            };
            port.set_raw()?;
            Ok(port)
        }
    }

    pub fn slave_path(&self) -> &str {
        &self.slave_path
    }

    /// Binary-safe line settings: no echo, no CR/LF mapping.
    fn set_raw(&self) -> io::Result<()> {
        unsafe {
            let mut term: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(self.master_fd, &mut term) != 0 {
                return Err(io::Error::last_os_error());
            }
            libc::cfmakeraw(&mut term);
            if libc::tcsetattr(self.master_fd, libc::TCSANOW, &term) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }
}

impl Drop for VirtualUartPort {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.master_fd);
        }
    }
}

impl PortHandler for VirtualUartPort {
    fn clear_port(&mut self) -> io::Result<()> {
        let available = self.get_bytes_available()?;
        self.read_port(available)?;
        Ok(())
    }

    fn read_port(&mut self, length: usize) -> io::Result<Vec<u8>> {
        let mut out = vec![0u8; length];
        if length == 0 {
            return Ok(out);
        }
        let read_len = unsafe {
            libc::read(
                self.master_fd,
                out.as_mut_ptr() as *mut libc::c_void,
                length,
            )
        };
        if read_len < 0 {
            let err = io::Error::last_os_error();
            if would_block(&err) {
                out.clear();
                return Ok(out);
            }
            return Err(err);
        }
        out.truncate(read_len as usize);
        Ok(out)
    }

    fn write_port(&mut self, packet: &[u8]) -> io::Result<usize> {
        if packet.is_empty() {
            return Ok(0);
        }
        let written = unsafe {
            libc::write(
                self.master_fd,
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
            )
        };
        if written < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(written as usize)
    }

    fn get_bytes_available(&self) -> io::Result<usize> {
        let mut bytes: libc::c_int = 0;
        let result = unsafe { libc::ioctl(self.master_fd, libc::FIONREAD, &mut bytes) };
        if result != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(bytes.max(0) as usize)
    }
}
