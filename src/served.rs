//! The receiving half of the protocol.
//!
//! [`Served`] is what a class handler sees of an incoming request: parameter lookup by name,
//! in-place write-back into read-write parameters, and a single diagnostic slot. [`Loopback`]
//! is a [`Transport`] that validates the request, dispatches it on its `class` and `verb`
//! parameters to handlers registered in-process, and reports back exactly like the GEOM control
//! device does. It is meant for exercising `geom(8)`-style tools without a kernel.
//!
//! # Example
//!
//! ```
//! use gctl::{Loopback, Request};
//!
//! let mut lo = Loopback::new();
//! lo.register("MIRROR", |req, verb| match verb {
//!     "status" => {
//!         let name = req
//!             .ascii_param("arg0")
//!             .map(|n| n.to_string_lossy().into_owned())
//!             .unwrap_or_default();
//!         req.set_param_err("state", format!("{name}: COMPLETE\0").as_bytes());
//!     }
//!     _ => {
//!         req.error(format_args!("Unknown verb."));
//!     }
//! });
//!
//! let mut state = [0u8; 32];
//! let mut req = Request::new();
//! req.ro_str("class", c"MIRROR");
//! req.ro_str("verb", c"status");
//! req.ro_str("arg0", c"gm0");
//! req.rw_bytes("state", &mut state);
//! req.issue_with(&mut lo).unwrap();
//! drop(req);
//! assert!(state.starts_with(b"gm0: COMPLETE\0"));
//! ```

use std::{
    ffi::{CStr, c_int},
    fmt::{self, Write as _},
    slice,
};

use errno::Errno;

use crate::{
    consts::{ENOMEM_MSG, GCTL_MAX_ARGS, GCTL_VERSION, SPECNAMELEN},
    param::ParamFlags,
    transport::Transport,
    wire::{GctlReq, GctlReqArg},
};

struct ServedParam<'r> {
    name: &'r CStr,
    flag: ParamFlags,
    /// `None` for zero-length parameters.
    value: Option<ServedValue<'r>>,
}

enum ServedValue<'r> {
    Ro(&'r [u8]),
    Rw(&'r mut [u8]),
}

impl ServedValue<'_> {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ro(v) => v,
            Self::Rw(v) => v,
        }
    }
}

/// A received control request.
pub struct Served<'r> {
    params: Vec<ServedParam<'r>>,
    error: Option<String>,
    nerror: c_int,
}

impl fmt::Debug for Served<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Served")
            .field("params", &self.params.iter().map(|p| p.name).collect::<Vec<_>>())
            .field("error", &self.error)
            .field("nerror", &self.nerror)
            .finish()
    }
}

impl<'r> Served<'r> {
    /// Takes in a marshalled request, validating it the way the GEOM control device does.
    ///
    /// Validation problems are recorded as the request's error; parameters after the offending
    /// one are not taken in.
    ///
    /// # Safety
    ///
    /// `req.arg` must point to `req.narg` valid records, whose names and values must be valid for
    /// their lengths and for `'r`. Values of records carrying `WR` must be writable and not
    /// aliased elsewhere.
    pub unsafe fn from_raw(req: &GctlReq) -> Self {
        let mut served = Self {
            params: Vec::new(),
            error: None,
            nerror: 0,
        };

        if req.version != GCTL_VERSION {
            served.error(format_args!("kernel and libgeom version mismatch."));
            return served;
        }
        if req.narg > GCTL_MAX_ARGS {
            served.error(format_args!("too many arguments"));
            return served;
        }
        if req.narg == 0 || req.arg.is_null() {
            return served;
        }

        let args: &[GctlReqArg] = unsafe { slice::from_raw_parts(req.arg, req.narg as usize) };
        for (i, ap) in args.iter().enumerate() {
            if ap.nlen < 1 || ap.nlen > SPECNAMELEN {
                served.error(format_args!("wrong param name length {i}: {}", ap.nlen));
                break;
            }
            let name = unsafe { slice::from_raw_parts(ap.name.cast::<u8>(), ap.nlen as usize) };
            let Ok(name) = CStr::from_bytes_with_nul(name) else {
                served.error(format_args!("unterminated param name"));
                break;
            };
            if ap.len < 0 {
                served.error(format_args!("negative param length"));
                break;
            }

            let flag = ParamFlags::from_bits_truncate(ap.flag);
            let len = ap.len as usize;
            let value = if len == 0 || ap.value.is_null() {
                None
            } else if flag.contains(ParamFlags::WR) {
                Some(ServedValue::Rw(unsafe {
                    slice::from_raw_parts_mut(ap.value.cast::<u8>(), len)
                }))
            } else {
                Some(ServedValue::Ro(unsafe {
                    slice::from_raw_parts(ap.value.cast::<u8>(), len)
                }))
            };
            served.params.push(ServedParam { name, flag, value });
        }
        served
    }

    fn find(&self, name: &str) -> Option<&ServedParam<'r>> {
        self.params
            .iter()
            .find(|p| p.name.to_bytes() == name.as_bytes())
    }

    /// Whether a parameter called `name` was sent, whatever its flags and length.
    pub fn has_param(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Looks up a readable parameter.
    ///
    /// Parameters without `RD`, and zero-length parameters, read as absent.
    pub fn param(&self, name: &str) -> Option<&[u8]> {
        self.params
            .iter()
            .filter(|p| p.flag.contains(ParamFlags::RD))
            .find(|p| p.name.to_bytes() == name.as_bytes())
            .and_then(|p| p.value.as_ref())
            .map(ServedValue::as_bytes)
    }

    /// Looks up a readable NUL-terminated string parameter.
    ///
    /// Any bytes before the NUL are accepted. Records an error if the parameter exists but is
    /// empty or not NUL-terminated.
    pub fn ascii_param(&mut self, name: &str) -> Option<&CStr> {
        let check = match self.param(name) {
            None if self.has_param(name) => Err("Argument without length"),
            None => return None,
            Some([.., 0]) => Ok(()),
            Some(_) => Err("Unterminated argument"),
        };
        if let Err(what) = check {
            self.error(format_args!("{what} ({name})"));
            return None;
        }
        CStr::from_bytes_until_nul(self.param(name)?).ok()
    }

    /// Looks up a readable parameter that has to be exactly `len` bytes long.
    pub fn param_len(&mut self, name: &str, len: usize) -> Option<&[u8]> {
        let found = self.find(name).map(|p| {
            p.flag.contains(ParamFlags::RD)
                && p.value.as_ref().map_or(0, |v| v.as_bytes().len()) == len
        });
        match found {
            Some(true) if self.param(name).is_some() => self.param(name),
            // Present and readable, but with no value to hand out.
            Some(true) => {
                self.error(format_args!("Missing {name} argument"));
                None
            }
            Some(false) => {
                self.error(format_args!("Wrong length {name} argument"));
                None
            }
            None => {
                self.error(format_args!("Missing {name} argument"));
                None
            }
        }
    }

    /// Reads an `int` parameter in native byte order.
    pub fn int_param(&mut self, name: &str) -> Option<c_int> {
        let bytes = self.param_len(name, size_of::<c_int>())?;
        Some(c_int::from_ne_bytes(bytes.try_into().ok()?))
    }

    /// Writes `value` back into the first parameter called `name`.
    ///
    /// # Errors
    ///
    /// - `EPERM` if the parameter is not writable;
    /// - `ENOSPC` if it is too short (as much as fits is still written);
    /// - `EINVAL` if there is no such parameter.
    pub fn set_param(&mut self, name: &str, value: &[u8]) -> Result<(), Errno> {
        let p = self
            .params
            .iter_mut()
            .find(|p| p.name.to_bytes() == name.as_bytes())
            .ok_or(Errno(libc::EINVAL))?;
        if !p.flag.contains(ParamFlags::WR) {
            return Err(Errno(libc::EPERM));
        }
        p.flag |= ParamFlags::CHANGED;
        let Some(ServedValue::Rw(dst)) = &mut p.value else {
            return if value.is_empty() {
                Ok(())
            } else {
                Err(Errno(libc::ENOSPC))
            };
        };
        if dst.len() < value.len() {
            let n = dst.len();
            dst.copy_from_slice(&value[..n]);
            return Err(Errno(libc::ENOSPC));
        }
        dst[..value.len()].copy_from_slice(value);
        Ok(())
    }

    /// Like [`Served::set_param`], but records a diagnostic instead of returning an error code.
    pub fn set_param_err(&mut self, name: &str, value: &[u8]) {
        match self.set_param(name, value) {
            Ok(()) => {}
            Err(Errno(libc::EPERM)) => {
                self.error(format_args!("No write access {name} argument"));
            }
            Err(Errno(libc::ENOSPC)) => {
                self.error(format_args!("Wrong length {name} argument"));
            }
            Err(_) => {
                self.error(format_args!("Missing {name} argument"));
            }
        }
    }

    /// Whether the remote side wrote to the named parameter.
    pub fn changed(&self, name: &str) -> bool {
        self.find(name)
            .is_some_and(|p| p.flag.contains(ParamFlags::CHANGED))
    }

    /// Records a diagnostic for the caller.
    ///
    /// Only the first diagnostic is kept. Returns the request's error code, which becomes `EINVAL`
    /// with the first diagnostic unless a code was already set.
    pub fn error(&mut self, args: fmt::Arguments<'_>) -> c_int {
        if self.error.is_some() {
            if self.nerror == 0 {
                self.nerror = libc::EEXIST;
            }
            return self.nerror;
        }
        if self.nerror == 0 {
            self.nerror = libc::EINVAL;
        }
        let mut msg = String::new();
        if msg.write_fmt(args).is_err() {
            msg = String::from(ENOMEM_MSG);
        }
        log::debug!("gctl {:p} error \"{msg}\"", self);
        self.error = Some(msg);
        self.nerror
    }

    /// The diagnostic recorded so far, if any.
    pub fn error_msg(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Copies the recorded diagnostic into the caller's error buffer and returns the outcome of
    /// the call.
    ///
    /// # Safety
    ///
    /// `req.error` must be valid for writes of `req.lerror` bytes.
    unsafe fn finish(self, req: &mut GctlReq) -> Result<(), Errno> {
        if let Some(msg) = &self.error {
            let n = (req.lerror as usize).min(msg.len() + 1);
            let dst = unsafe { slice::from_raw_parts_mut(req.error.cast::<u8>(), n) };
            let copied = n.min(msg.len());
            dst[..copied].copy_from_slice(&msg.as_bytes()[..copied]);
            if copied < n {
                dst[copied] = 0;
            }
        }
        req.nerror = self.nerror;
        match self.nerror {
            0 => Ok(()),
            e => Err(Errno(e)),
        }
    }
}

type Handler = Box<dyn FnMut(&mut Served<'_>, &str)>;

/// An in-process stand-in for the GEOM control device.
#[derive(Default)]
pub struct Loopback {
    classes: Vec<(String, Option<Handler>)>,
}

impl fmt::Debug for Loopback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.classes.iter().map(|(name, _)| name))
            .finish()
    }
}

impl Loopback {
    /// Creates a loopback with no classes registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class whose handler receives every request naming it, along with the verb.
    pub fn register<F>(&mut self, class: &str, handler: F)
    where
        F: FnMut(&mut Served<'_>, &str) + 'static,
    {
        self.classes.push((class.to_owned(), Some(Box::new(handler))));
    }

    /// Registers a class that exists but accepts no requests.
    pub fn register_passive(&mut self, class: &str) {
        self.classes.push((class.to_owned(), None));
    }

    fn dispatch(&mut self, req: &mut Served<'_>) {
        let Some(class) = req.ascii_param("class").map(CStr::to_owned) else {
            req.error(format_args!("Class not specified"));
            return;
        };
        let found = self
            .classes
            .iter_mut()
            .find(|(name, _)| name.as_bytes() == class.to_bytes());
        let Some((_, handler)) = found else {
            req.error(format_args!(
                "Class not found: \"{}\"",
                class.to_string_lossy()
            ));
            return;
        };
        let Some(handler) = handler else {
            req.error(format_args!("Class takes no requests"));
            return;
        };
        let verb = match req.param("verb") {
            Some(verb) => CStr::from_bytes_until_nul(verb)
                .map(|v| v.to_string_lossy().into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(verb).into_owned()),
            None => {
                req.error(format_args!("Verb missing"));
                return;
            }
        };
        (*handler)(req, &verb);
    }
}

impl Transport for Loopback {
    type Handle = ();

    fn open(&mut self) -> Result<(), Errno> {
        Ok(())
    }

    unsafe fn submit(&mut self, _: &mut (), req: &mut GctlReq) -> Result<(), Errno> {
        // It is an error if we cannot return an error.
        if req.lerror < 2 {
            return Err(Errno(libc::EINVAL));
        }
        let mut served = unsafe { Served::from_raw(req) };
        if served.nerror == 0 {
            self.dispatch(&mut served);
        }
        unsafe { served.finish(req) }
    }
}
