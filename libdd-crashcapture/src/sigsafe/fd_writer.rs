// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::ffi::CStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use thiserror::Error;

/// Largest destination path, terminator included.
pub const EVENT_PATH_MAX: usize = 384;

const BUFFER_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("Failed to open snapshot file (errno {0})")]
    Open(i32),
    #[error("Failed to write snapshot (errno {0})")]
    Write(i32),
    #[error("Failed to close snapshot file (errno {0})")]
    Close(i32),
    #[error("Snapshot writer was closed")]
    Closed,
    #[error("Event changed while the snapshot was written")]
    Torn,
}

/// A NUL terminated file path held inline, so it can be handed to `open(2)` from a signal
/// handler. Built ahead of time, in ordinary context.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EventPath {
    bytes: [u8; EVENT_PATH_MAX],
}

impl EventPath {
    /// Returns `None` if the path is empty, contains a NUL, or does not fit.
    pub fn new(path: &Path) -> Option<Self> {
        let raw = path.as_os_str().as_bytes();
        if raw.is_empty() || raw.len() >= EVENT_PATH_MAX || raw.contains(&0) {
            return None;
        }
        let mut bytes = [0u8; EVENT_PATH_MAX];
        bytes[..raw.len()].copy_from_slice(raw);
        Some(Self { bytes })
    }

    pub fn as_c_str(&self) -> &CStr {
        // Construction guarantees a terminator inside the array.
        CStr::from_bytes_until_nul(&self.bytes).unwrap_or_default()
    }

    pub fn as_path(&self) -> &Path {
        Path::new(std::ffi::OsStr::from_bytes(self.as_c_str().to_bytes()))
    }
}

impl std::fmt::Debug for EventPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_path().fmt(f)
    }
}

/// Destination for encoded snapshot bytes.
pub trait Sink {
    fn put(&mut self, bytes: &[u8]) -> Result<(), SnapshotError>;
}

impl Sink for Vec<u8> {
    /// Not signal safe: grows the vector.
    fn put(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Buffered output straight onto a file descriptor.
///
/// SIGNAL SAFETY:
///     Only `open(2)`, `write(2)` and `close(2)` are called, all async-signal-safe. The buffer
///     lives inline in the writer, so nothing is allocated.
pub struct FdWriter {
    fd: libc::c_int,
    owned: bool,
    buf: [u8; BUFFER_LEN],
    len: usize,
}

impl FdWriter {
    /// Creates or truncates the file at `path`.
    pub fn create(path: &CStr) -> Result<Self, SnapshotError> {
        // SAFETY: `path` is a valid NUL terminated string.
        let fd = unsafe {
            libc::open(
                path.as_ptr(),
                libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC | libc::O_CLOEXEC,
                0o644 as libc::c_uint,
            )
        };
        if fd < 0 {
            return Err(SnapshotError::Open(errno::errno().0));
        }
        Ok(Self::with_fd(fd, true))
    }

    /// Writes onto a descriptor owned by the caller. The descriptor is not closed.
    pub fn borrowed(fd: libc::c_int) -> Self {
        Self::with_fd(fd, false)
    }

    fn with_fd(fd: libc::c_int, owned: bool) -> Self {
        Self {
            fd,
            owned,
            buf: [0; BUFFER_LEN],
            len: 0,
        }
    }

    pub fn flush(&mut self) -> Result<(), SnapshotError> {
        let len = std::mem::take(&mut self.len);
        write_all(self.fd, &self.buf[..len])
    }

    /// Flushes, then closes the descriptor if this writer opened it.
    pub fn finish(mut self) -> Result<(), SnapshotError> {
        let flushed = self.flush();
        let closed = self.close();
        flushed.and(closed)
    }

    fn close(&mut self) -> Result<(), SnapshotError> {
        let fd = std::mem::replace(&mut self.fd, -1);
        if !self.owned || fd < 0 {
            return Ok(());
        }
        // SAFETY: we opened `fd` and nothing else closes it.
        if unsafe { libc::close(fd) } != 0 {
            return Err(SnapshotError::Close(errno::errno().0));
        }
        Ok(())
    }
}

impl Sink for FdWriter {
    fn put(&mut self, bytes: &[u8]) -> Result<(), SnapshotError> {
        if bytes.len() > BUFFER_LEN - self.len {
            self.flush()?;
        }
        if bytes.len() > BUFFER_LEN {
            return write_all(self.fd, bytes);
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }
}

impl Drop for FdWriter {
    fn drop(&mut self) {
        // Best effort; `finish` is the path that reports errors.
        let _ = self.close();
    }
}

fn write_all(fd: libc::c_int, mut bytes: &[u8]) -> Result<(), SnapshotError> {
    if fd < 0 {
        return Err(SnapshotError::Closed);
    }
    while !bytes.is_empty() {
        // SAFETY: the pointer and length come from a live slice.
        let written =
            unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
        if written < 0 {
            let err = errno::errno().0;
            if err == libc::EINTR {
                continue;
            }
            return Err(SnapshotError::Write(err));
        }
        if written == 0 {
            return Err(SnapshotError::Write(libc::EIO));
        }
        bytes = &bytes[written as usize..];
    }
    Ok(())
}

/// Removes the file at `path`. Async-signal-safe.
pub fn unlink(path: &CStr) -> bool {
    // SAFETY: `path` is a valid NUL terminated string.
    unsafe { libc::unlink(path.as_ptr()) == 0 }
}
