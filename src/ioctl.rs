//! Typed `ioctl` request codes.
//!
//! GEOM uses exactly one `ioctl`, [`GEOM_CTL`](crate::wire::GEOM_CTL), declared in
//! `geom/geom_ctl.h` as:
//!
//! ```c
//! #define GEOM_CTL	_IOW('G', GCTL_VERSION, struct gctl_req)
//! ```
//!
//! The types here encode such a declaration in Rust, so the argument type travels with the request
//! code and cannot be mixed up at the call site.

use std::{ffi::c_int, fmt, io, marker::PhantomData, os::fd::AsRawFd};

use crate::platform;

/// An `ioctl` taking a single argument of type `T`.
///
/// Constructed with [`_IOW`] or [`_IOC`], or from a raw request code via [`Ioctl::from_raw`].
pub struct Ioctl<T> {
    request: u32,
    _p: PhantomData<T>,
}

impl<T> Copy for Ioctl<T> {}
impl<T> Clone for Ioctl<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> fmt::Debug for Ioctl<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ioctl({:#010x})", self.request)
    }
}

impl<T> Ioctl<T> {
    /// Creates an [`Ioctl`] object from a raw request code and an arbitrary argument type.
    pub const fn from_raw(request: u32) -> Self {
        Self {
            request,
            _p: PhantomData,
        }
    }

    /// Returns the `ioctl` request code.
    ///
    /// This is passed to `ioctl(2)` as its second argument.
    pub const fn request(self) -> u32 {
        self.request
    }

    /// Performs the `ioctl` with `arg` as its only argument.
    ///
    /// Returns the value returned by the `ioctl(2)` invocation, or an I/O error built from *errno*
    /// if the call returned -1.
    ///
    /// # Safety
    ///
    /// The caller has to ensure that `fd` belongs to the driver that defined this request code, and
    /// that `arg` (and everything reachable through it) is valid for whatever the driver reads or
    /// writes.
    pub unsafe fn ioctl(self, fd: &impl AsRawFd, arg: T) -> io::Result<c_int> {
        let res = unsafe { libc::ioctl(fd.as_raw_fd(), self.request as _, arg) };
        if res == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }
}

/// Direction of an [`Ioctl`], from the point of view of userspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dir(u32);

/// The kernel copies data in from userspace through the pointer argument.
pub const IOC_IN: Dir = Dir(platform::IOC_IN);

/// Creates an [`Ioctl`] that passes a `T` to the kernel by pointer.
///
/// Note that "write" only refers to the argument structure itself. A structure that carries
/// further pointers (as `struct gctl_req` does) may still have memory written through those.
///
/// # Errors
///
/// This method will cause a compile-time assertion failure if the size of `T` exceeds the `ioctl`
/// argument size limit.
///
/// # Example
///
/// ```
/// use gctl::ioctl::{Ioctl, _IOW};
///
/// #[repr(C)]
/// struct Args {
///     a: u32,
///     b: u32,
/// }
///
/// const EXAMPLE: Ioctl<*const Args> = _IOW(b'G', 7);
/// assert_ne!(EXAMPLE.request(), 0);
/// ```
#[allow(non_snake_case)]
pub const fn _IOW<T>(ty: u8, nr: u8) -> Ioctl<*const T> {
    const {
        assert!(size_of::<T>() <= platform::MAX_ARG_SIZE);
    }
    _IOC(IOC_IN, ty, nr, size_of::<T>())
}

/// Manually constructs an [`Ioctl`] from its components.
///
/// # Panics
///
/// This function panics when `size` exceeds the (platform-specific) maximum parameter size.
#[allow(non_snake_case)]
#[inline]
pub const fn _IOC<T>(dir: Dir, ty: u8, nr: u8, size: usize) -> Ioctl<T> {
    assert!(size <= platform::MAX_ARG_SIZE);

    let request = platform::_IOC(dir.0, ty as u32, nr as u32, size as u32);
    Ioctl::from_raw(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iow_matches_ioc() {
        let a: Ioctl<*const [u8; 64]> = _IOW(b'G', 2);
        let b: Ioctl<*const [u8; 64]> = _IOC(IOC_IN, b'G', 2, 64);
        assert_eq!(a.request(), b.request());
    }

    #[test]
    #[cfg(any(target_os = "freebsd", target_os = "dragonfly", target_os = "macos"))]
    fn bsd_encoding() {
        let ioc: Ioctl<*const [u8; 64]> = _IOW(b'G', 2);
        assert_eq!(ioc.request(), 0x8040_4702);
    }

    #[test]
    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    fn linux_encoding() {
        let ioc: Ioctl<*const [u8; 64]> = _IOW(b'G', 2);
        assert_eq!(ioc.request(), 0x4040_4702);
    }

    #[test]
    #[should_panic]
    fn oversized_argument() {
        let _ = _IOC::<()>(IOC_IN, b'G', 0, platform::MAX_ARG_SIZE + 1);
    }

    #[test]
    fn ioctl_on_non_device_fails() {
        let file = std::fs::File::open("Cargo.toml").unwrap();
        let ioc: Ioctl<*const [u8; 64]> = _IOW(b'G', 2);
        let arg = [0u8; 64];
        let err = unsafe { ioc.ioctl(&file, &arg) }.unwrap_err();
        assert!(err.raw_os_error().is_some());
    }
}
