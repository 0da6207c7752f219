//! Argument records.

use std::ffi::{CStr, CString, c_int};

bitflags::bitflags! {
    /// Wire-visible parameter flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParamFlags: c_int {
        /// The remote side may read the value.
        const RD = 1;
        /// The remote side may overwrite the value in place.
        const WR = 2;
        const RW = Self::RD.bits() | Self::WR.bits();
        /// The value is a NUL-terminated string. Only affects how it is displayed.
        const ASCII = 4;
        /// Set by the remote side on parameters it wrote to.
        const CHANGED = 32;
    }
}

/// A caller-owned parameter value.
///
/// The variant decides the direction: the remote side can only ever write through
/// [`Value::Rw`].
#[derive(Debug)]
pub enum Value<'a> {
    /// Read by the remote side only.
    Ro(&'a [u8]),
    /// May be overwritten in place by the remote side.
    Rw(&'a mut [u8]),
}

impl<'a> Value<'a> {
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ro(v) => v,
            Self::Rw(v) => v,
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Rw(_))
    }

    /// Shortens the value to its first `len` bytes. `len` must not exceed the current length.
    pub(crate) fn truncate(self, len: usize) -> Self {
        match self {
            Self::Ro(v) => Self::Ro(&v[..len]),
            Self::Rw(v) => Self::Rw(&mut v[..len]),
        }
    }

    /// Length of the NUL-terminated string at the start of the value, counting the NUL.
    pub(crate) fn terminated_len(&self) -> Option<usize> {
        self.as_bytes().iter().position(|&b| b == 0).map(|n| n + 1)
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.as_bytes().as_ptr()
    }

    pub(crate) fn as_wire_ptr(&mut self) -> *mut u8 {
        match self {
            // Never written through: the parameter does not carry `WR`.
            Self::Ro(v) => v.as_ptr().cast_mut(),
            Self::Rw(v) => v.as_mut_ptr(),
        }
    }
}

/// One named parameter of a [`Request`](crate::Request).
///
/// The name is an owned copy; the value is borrowed from the caller for the lifetime of the
/// request.
#[derive(Debug)]
pub struct Param<'a> {
    pub(crate) name: CString,
    pub(crate) value: Value<'a>,
    pub(crate) ascii: bool,
}

impl<'a> Param<'a> {
    /// The parameter name, as sent to the remote side.
    pub fn name(&self) -> &CStr {
        &self.name
    }

    /// Length of the name storage, including the terminating NUL.
    pub fn name_len(&self) -> usize {
        self.name.as_bytes_with_nul().len()
    }

    /// The bytes the remote side sees, `len()` of them.
    pub fn value(&self) -> &[u8] {
        self.value.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Wire flags: `RD` or `RW` from the value kind, plus `ASCII` for strings.
    pub fn flags(&self) -> ParamFlags {
        let mut flags = if self.value.is_writable() {
            ParamFlags::RW
        } else {
            ParamFlags::RD
        };
        flags.set(ParamFlags::ASCII, self.ascii);
        flags
    }
}
