//! Linux epoll notification port.
//!
//! Thin adapter over `epoll_create1`/`epoll_ctl`/`epoll_wait` via libc.
//! The `unsafe` here is confined to the syscalls themselves; the kernel
//! cannot know whether an fd stays valid for the life of its
//! registration, so the reactor above keeps that bookkeeping.

use super::{EventBatch, NotificationPort, PortEvent};
use crate::translate::NativeMask;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Notification port backed by a Linux epoll instance.
#[derive(Debug)]
pub struct EpollPort {
    epfd: RawFd,
}

impl EpollPort {
    /// Creates a new epoll instance with close-on-exec set.
    ///
    /// # Errors
    ///
    /// Returns the OS error if `epoll_create1` fails (e.g. fd limits).
    pub fn new() -> io::Result<Self> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { epfd })
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, event: *mut libc::epoll_event) -> io::Result<()> {
        let ret = unsafe { libc::epoll_ctl(self.epfd, op, fd, event) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl NotificationPort for EpollPort {
    fn register(&self, fd: RawFd, native: NativeMask, tag: u64) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: native.bits(),
            u64: tag,
        };
        self.ctl(libc::EPOLL_CTL_ADD, fd, &mut event)
    }

    fn modify(&self, fd: RawFd, native: NativeMask, tag: u64) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: native.bits(),
            u64: tag,
        };
        self.ctl(libc::EPOLL_CTL_MOD, fd, &mut event)
    }

    fn unregister(&self, fd: RawFd) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut())
    }

    fn wait(&self, batch: &mut EventBatch, timeout: Option<Duration>) -> io::Result<usize> {
        batch.clear();

        let capacity = batch.capacity().max(1);
        let mut buffer: Vec<libc::epoll_event> = Vec::with_capacity(capacity);

        let timeout_ms: libc::c_int = match timeout {
            Some(duration) => duration
                .as_millis()
                .try_into()
                .unwrap_or(libc::c_int::MAX),
            None => -1,
        };

        let ret = unsafe {
            libc::epoll_wait(self.epfd, buffer.as_mut_ptr(), capacity as libc::c_int, timeout_ms)
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }

        // SAFETY: epoll_wait wrote `ret` entries into the buffer.
        unsafe {
            buffer.set_len(ret as usize);
        }

        for entry in &buffer {
            batch.push(PortEvent {
                tag: entry.u64,
                ready: NativeMask::from_bits(entry.events),
            });
        }
        Ok(batch.len())
    }
}

impl Drop for EpollPort {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.epfd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pipe {
        read_fd: RawFd,
        write_fd: RawFd,
    }

    impl Pipe {
        fn new() -> Self {
            let mut fds = [0 as RawFd; 2];
            let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
            assert_eq!(ret, 0, "pipe() failed");
            Self {
                read_fd: fds[0],
                write_fd: fds[1],
            }
        }

        fn write_byte(&self) {
            let buf = [1u8];
            let ret =
                unsafe { libc::write(self.write_fd, buf.as_ptr().cast::<libc::c_void>(), 1) };
            assert_eq!(ret, 1, "write() failed");
        }
    }

    impl Drop for Pipe {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.read_fd);
                libc::close(self.write_fd);
            }
        }
    }

    #[test]
    fn reports_readable_pipe_with_tag() {
        let port = EpollPort::new().expect("epoll");
        let pipe = Pipe::new();

        port.register(pipe.read_fd, NativeMask::IN, 42).expect("register");
        pipe.write_byte();

        let mut batch = EventBatch::with_capacity(8);
        let n = port
            .wait(&mut batch, Some(Duration::from_secs(5)))
            .expect("wait");
        assert_eq!(n, 1);

        let event = batch.iter().next().expect("one event");
        assert_eq!(event.tag, 42);
        assert!(event.ready.intersects(NativeMask::IN));

        port.unregister(pipe.read_fd).expect("unregister");
    }

    #[test]
    fn timeout_produces_empty_batch() {
        let port = EpollPort::new().expect("epoll");
        let pipe = Pipe::new();
        port.register(pipe.read_fd, NativeMask::IN, 1).expect("register");

        let mut batch = EventBatch::with_capacity(4);
        let n = port
            .wait(&mut batch, Some(Duration::from_millis(10)))
            .expect("wait");
        assert_eq!(n, 0);
        assert!(batch.is_empty());
    }

    #[test]
    fn register_rejects_closed_fd() {
        let port = EpollPort::new().expect("epoll");
        let err = port
            .register(-1, NativeMask::IN, 0)
            .expect_err("bad fd must fail");
        assert!(err.raw_os_error().is_some());
    }

    #[test]
    fn unregister_unknown_fd_fails_softly() {
        let port = EpollPort::new().expect("epoll");
        let pipe = Pipe::new();
        let err = port.unregister(pipe.read_fd).expect_err("not registered");
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}
