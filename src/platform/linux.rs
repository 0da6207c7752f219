//! `ioctl` request encoding for Linux and Android.
//!
//! GEOM does not exist here, but the request code still has to be encodable so the crate builds
//! and [`Loopback`](crate::Loopback) can stand in for the device.

#[cfg(any(
    target_arch = "mips",
    target_arch = "mips64",
    target_arch = "sparc",
    target_arch = "sparc64",
    target_arch = "powerpc",
    target_arch = "powerpc64",
))]
mod arch {
    pub(crate) const SIZEBITS: u32 = 13;
    /// `_IOC_WRITE`: userspace writes to the kernel.
    pub(crate) const IOC_IN: u32 = 4;
}

#[cfg(not(any(
    target_arch = "mips",
    target_arch = "mips64",
    target_arch = "sparc",
    target_arch = "sparc64",
    target_arch = "powerpc",
    target_arch = "powerpc64",
)))]
mod arch {
    pub(crate) const SIZEBITS: u32 = 14;
    pub(crate) const IOC_IN: u32 = 1;
}

pub(crate) use arch::IOC_IN;

// nr:8 | type:8 | size:SIZEBITS | dir
const TYPESHIFT: u32 = 8;
const SIZESHIFT: u32 = 16;
const DIRSHIFT: u32 = SIZESHIFT + arch::SIZEBITS;

/// The largest argument size that can be portably encoded.
pub(crate) const MAX_ARG_SIZE: usize = (1 << 13) - 1;

#[expect(non_snake_case)]
pub(crate) const fn _IOC(dir: u32, ty: u32, nr: u32, size: u32) -> u32 {
    dir << DIRSHIFT | ty << TYPESHIFT | nr | size << SIZESHIFT
}
