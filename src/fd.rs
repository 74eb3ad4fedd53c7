//! File descriptor preparation and draining helpers.
//!
//! Descriptors handed to the reactor should be non-blocking; these
//! helpers wrap the `fcntl` calls and the short-read-tolerant drain loop
//! callers otherwise reimplement by hand.

use std::io;
use std::os::unix::io::RawFd;

/// Sets `O_NONBLOCK` on `fd`. Idempotent: a descriptor that already has
/// the flag is left untouched.
///
/// # Errors
///
/// The underlying `fcntl` error, typically `EBADF`.
pub fn make_non_blocking(fd: RawFd) -> io::Result<()> {
    set_status_flag(fd, libc::F_GETFL, libc::F_SETFL, libc::O_NONBLOCK)
}

/// Sets `FD_CLOEXEC` on `fd`. Idempotent.
///
/// # Errors
///
/// The underlying `fcntl` error, typically `EBADF`.
pub fn make_close_on_exec(fd: RawFd) -> io::Result<()> {
    set_status_flag(fd, libc::F_GETFD, libc::F_SETFD, libc::FD_CLOEXEC)
}

fn set_status_flag(fd: RawFd, get: libc::c_int, set: libc::c_int, flag: libc::c_int) -> io::Result<()> {
    // SAFETY: plain fcntl on a caller-supplied fd; no memory is passed.
    let flags = unsafe { libc::fcntl(fd, get) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if flags & flag == flag {
        return Ok(());
    }
    // SAFETY: as above.
    let rc = unsafe { libc::fcntl(fd, set, flags | flag) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Reads from a non-blocking `fd` until `buf` is full or the descriptor
/// has nothing more to give, accumulating across short reads.
///
/// End-of-file, a drained descriptor (`EAGAIN`/`EWOULDBLOCK`), and
/// signal interruption all terminate the loop with the byte count
/// accumulated so far; partial data is never discarded.
///
/// # Errors
///
/// Any other read failure, with nothing reported about bytes already
/// copied into `buf`.
pub fn robust_read(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0usize;
    while total < buf.len() {
        let rest = &mut buf[total..];
        // SAFETY: the pointer and length describe the unread tail of a
        // live mutable slice.
        let n = unsafe {
            libc::read(fd, rest.as_mut_ptr().cast::<libc::c_void>(), rest.len())
        };
        if n > 0 {
            #[allow(clippy::cast_sign_loss)]
            {
                total += n as usize;
            }
            continue;
        }
        if n == 0 {
            break;
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code)
                if code == libc::EINTR
                    || code == libc::EAGAIN
                    || code == libc::EWOULDBLOCK =>
            {
                break;
            }
            _ => return Err(err),
        }
    }
    Ok(total)
}
