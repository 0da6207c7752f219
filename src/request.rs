//! Building control requests.

use std::{
    ffi::{CStr, CString, c_int},
    fmt::{self, Write as _},
};

use crate::{
    consts::ENOMEM_MSG,
    param::{Param, Value},
};

enum Length {
    Exact(usize),
    Terminated,
}

impl From<isize> for Length {
    fn from(len: isize) -> Self {
        match usize::try_from(len) {
            Ok(n) => Self::Exact(n),
            Err(_) => Self::Terminated,
        }
    }
}

/// A control request under construction.
///
/// Parameters are kept in insertion order. Duplicate names are allowed and produce duplicate
/// entries.
///
/// Building never fails outright: the first problem is latched as the request's error, every
/// later attempt to add a parameter is silently ignored, and the latched message is reported by
/// [`Request::issue`]. This lets a caller chain any number of `*_param` calls and check for errors
/// once.
///
/// # Example
///
/// ```
/// use gctl::Request;
///
/// let nargs: i32 = 1;
/// let mut req = Request::new();
/// req.ro_str("class", c"MIRROR");
/// req.ro_str("verb", c"status");
/// req.ro_int("nargs", &nargs);
/// req.ro_param("arg0", -1, b"gm0\0");
///
/// assert_eq!(req.len(), 4);
/// assert!(req.error().is_none());
/// ```
#[derive(Debug, Default)]
pub struct Request<'a> {
    pub(crate) params: Vec<Param<'a>>,
    pub(crate) error: Option<String>,
    pub(crate) error_buf: Option<Vec<u8>>,
}

impl<'a> Request<'a> {
    /// Creates an empty request.
    ///
    /// No memory is allocated until the first parameter is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter the remote side may only read.
    ///
    /// A non-negative `len` makes it a binary parameter of exactly `len` bytes taken from the
    /// start of `value`. A negative `len` treats `value` as a NUL-terminated string: the length
    /// becomes the string length plus one and the parameter is tagged ASCII.
    pub fn ro_param(&mut self, name: &str, len: isize, value: &'a [u8]) {
        self.add(name, len.into(), Value::Ro(value));
    }

    /// Adds a parameter the remote side may read and overwrite in place.
    ///
    /// `len` follows the same rules as for [`Request::ro_param`]. The remote side may write up to
    /// the resulting length into `value`, which stays borrowed until the request is dropped.
    pub fn rw_param(&mut self, name: &str, len: isize, value: &'a mut [u8]) {
        self.add(name, len.into(), Value::Rw(value));
    }

    /// Adds a read-only string parameter.
    pub fn ro_str(&mut self, name: &str, value: &'a CStr) {
        self.add(name, Length::Terminated, Value::Ro(value.to_bytes_with_nul()));
    }

    /// Adds a read-only binary parameter covering all of `value`.
    pub fn ro_bytes(&mut self, name: &str, value: &'a [u8]) {
        self.add(name, Length::Exact(value.len()), Value::Ro(value));
    }

    /// Adds a read-write binary parameter covering all of `value`.
    pub fn rw_bytes(&mut self, name: &str, value: &'a mut [u8]) {
        self.add(name, Length::Exact(value.len()), Value::Rw(value));
    }

    /// Adds a read-only `int` parameter, in native byte order.
    pub fn ro_int(&mut self, name: &str, value: &'a c_int) {
        let bytes = unsafe {
            std::slice::from_raw_parts((value as *const c_int).cast::<u8>(), size_of::<c_int>())
        };
        self.ro_bytes(name, bytes);
    }

    /// Adds a read-write `int` parameter, in native byte order.
    pub fn rw_int(&mut self, name: &str, value: &'a mut c_int) {
        let bytes = unsafe {
            std::slice::from_raw_parts_mut((value as *mut c_int).cast::<u8>(), size_of::<c_int>())
        };
        self.rw_bytes(name, bytes);
    }

    /// Latches a formatted error message, unless one is already latched.
    ///
    /// The message is only formatted when it is going to be stored.
    pub fn set_error(&mut self, args: fmt::Arguments<'_>) {
        if self.error.is_some() {
            return;
        }
        let mut msg = String::new();
        if msg.write_fmt(args).is_err() {
            msg = String::from(ENOMEM_MSG);
        }
        log::debug!("gctl request {:p}: latched error \"{msg}\"", self);
        self.error = Some(msg);
    }

    /// The latched error, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The parameters, in the order they were added.
    pub fn params(&self) -> &[Param<'a>] {
        &self.params
    }

    /// Returns the first parameter called `name`.
    pub fn param(&self, name: &str) -> Option<&Param<'a>> {
        self.params
            .iter()
            .find(|p| p.name.as_bytes() == name.as_bytes())
    }

    /// Number of parameters added successfully.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub(crate) fn alloc_failed(&mut self) {
        self.set_error(format_args!("{ENOMEM_MSG}"));
    }

    fn add(&mut self, name: &str, len: Length, value: Value<'a>) {
        if self.error.is_some() {
            return;
        }

        // Grow first, so a failure leaves the stored parameters untouched.
        if self.params.try_reserve(1).is_err() {
            return self.alloc_failed();
        }
        let Some(name) = self.copy_name(name) else {
            return;
        };

        let (len, ascii) = match len {
            Length::Exact(n) => (n, false),
            Length::Terminated => match value.terminated_len() {
                Some(n) => (n, true),
                None => {
                    return self.set_error(format_args!(
                        "Parameter {} is not NUL-terminated",
                        name.to_string_lossy()
                    ));
                }
            },
        };
        if len > value.len() {
            return self.set_error(format_args!(
                "Parameter {}: length {len} exceeds {}-byte buffer",
                name.to_string_lossy(),
                value.len()
            ));
        }
        if c_int::try_from(len).is_err() {
            return self.set_error(format_args!(
                "Parameter {}: length {len} out of range",
                name.to_string_lossy()
            ));
        }

        let param = Param {
            name,
            value: value.truncate(len),
            ascii,
        };
        log::trace!(
            "gctl request {:p}: param {:?} flags {:?} len {len}",
            self,
            param.name,
            param.flags()
        );
        self.params.push(param);
    }

    fn copy_name(&mut self, name: &str) -> Option<CString> {
        let mut buf = Vec::new();
        if buf.try_reserve_exact(name.len() + 1).is_err() {
            self.alloc_failed();
            return None;
        }
        buf.extend_from_slice(name.as_bytes());
        match CString::new(buf) {
            Ok(name) => Some(name),
            Err(_) => {
                self.set_error(format_args!(
                    "Parameter name contains NUL: {}",
                    name.escape_default()
                ));
                None
            }
        }
    }
}

impl Drop for Request<'_> {
    fn drop(&mut self) {
        log::trace!(
            "gctl request {:p}: releasing {} params",
            self,
            self.params.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamFlags;

    #[test]
    fn binary_length_is_exact() {
        let data = [1u8, 2, 3, 4];
        let mut req = Request::new();
        req.ro_param("a", 2, &data);
        req.ro_param("b", 0, &data);

        let a = &req.params()[0];
        assert_eq!(a.value(), &[1, 2]);
        assert_eq!(a.flags(), ParamFlags::RD);
        assert_eq!(req.params()[1].len(), 0);
        assert!(req.error().is_none());
    }

    #[test]
    fn negative_length_means_string() {
        let mut out = *b"abc\0garbage";
        let mut req = Request::new();
        req.ro_param("verb", -1, b"status\0");
        req.rw_param("out", -5, &mut out);

        let verb = req.param("verb").unwrap();
        assert_eq!(verb.len(), "status".len() + 1);
        assert_eq!(verb.flags(), ParamFlags::RD | ParamFlags::ASCII);
        assert_eq!(verb.name_len(), 5);

        let out = req.param("out").unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out.flags(), ParamFlags::RW | ParamFlags::ASCII);
    }

    #[test]
    fn typed_helpers() {
        let n: c_int = 7;
        let mut m: c_int = 0;
        let mut buf = [0u8; 16];
        let mut req = Request::new();
        req.ro_str("class", c"LABEL");
        req.ro_int("nargs", &n);
        req.rw_int("m", &mut m);
        req.rw_bytes("buf", &mut buf);

        assert_eq!(req.param("class").unwrap().value(), b"LABEL\0");
        assert_eq!(req.param("nargs").unwrap().value(), &7i32.to_ne_bytes());
        assert_eq!(req.param("m").unwrap().flags(), ParamFlags::RW);
        assert_eq!(req.param("buf").unwrap().len(), 16);
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let mut req = Request::new();
        req.ro_str("arg", c"one");
        req.ro_str("arg", c"two");
        assert_eq!(req.len(), 2);
        assert_eq!(req.param("arg").unwrap().value(), b"one\0");
        assert_eq!(req.params()[1].value(), b"two\0");
    }

    #[test]
    fn latched_error_is_sticky() {
        let mut req = Request::new();
        req.ro_str("ok", c"x");
        req.ro_param("bad", -1, b"no terminator");
        let latched = req.error().unwrap().to_owned();
        assert_eq!(latched, "Parameter bad is not NUL-terminated");

        req.ro_str("late", c"y");
        req.ro_param("long", 100, b"short");
        req.set_error(format_args!("something else"));
        assert_eq!(req.len(), 1);
        assert_eq!(req.error(), Some(latched.as_str()));
    }

    #[test]
    fn length_beyond_buffer_latches() {
        let mut req = Request::new();
        req.ro_param("x", 9, b"1234");
        assert_eq!(req.error(), Some("Parameter x: length 9 exceeds 4-byte buffer"));
        assert!(req.is_empty());
    }

    #[test]
    fn name_with_nul_latches() {
        let mut req = Request::new();
        req.ro_bytes("a\0b", b"1");
        assert!(req.error().unwrap().starts_with("Parameter name contains NUL"));
        assert!(req.is_empty());
    }

    #[test]
    fn alloc_message() {
        let mut req = Request::new();
        req.ro_str("kept", c"x");
        req.alloc_failed();
        assert_eq!(req.error(), Some("Could not allocate memory"));
        req.alloc_failed();
        req.set_error(format_args!("later"));
        assert_eq!(req.error(), Some("Could not allocate memory"));

        req.ro_str("dropped", c"y");
        req.rw_bytes("dropped", &mut []);
        assert_eq!(req.len(), 1);

        let err = req.issue_with(&mut crate::Loopback::new()).unwrap_err();
        assert!(matches!(&err, crate::Error::Latched(m) if m == "Could not allocate memory"));
        assert_eq!(err.to_string(), "Could not allocate memory");
        assert!(req.error_buf.is_none());
    }
}
