//! GEOM control requests.
//!
//! This library builds and issues *gctl* requests, the self-describing control protocol that
//! FreeBSD's GEOM framework exposes through `/dev/geom.ctl`. It is the Rust counterpart of the
//! `gctl_*` functions in `libgeom(3)`.
//!
//! A request is an ordered list of named parameters. Each parameter borrows a caller-owned value
//! and is either read-only or read-write; the kernel may overwrite read-write values in place.
//! The whole list travels to the kernel in a single `ioctl`, which blocks until the operation has
//! completed. Diagnostics come back as text in an error buffer owned by the request.
//!
//! # Example
//!
//! The equivalent of `gmirror status gm0`:
//!
//! ```no_run
//! use std::ffi::c_int;
//! use gctl::Request;
//!
//! let nargs: c_int = 1;
//! let mut req = Request::new();
//! req.ro_str("class", c"MIRROR");
//! req.ro_str("verb", c"status");
//! req.ro_int("nargs", &nargs);
//! req.ro_str("arg0", c"gm0");
//!
//! if let Err(e) = req.issue() {
//!     eprintln!("gmirror: {e}");
//! }
//! ```
//!
//! # Errors
//!
//! Building a request never fails outright. The first problem (an allocation failure, a name
//! containing NUL, a length that does not fit the value) is latched on the request, later
//! parameters are ignored, and [`Request::issue`] reports the latched message. All errors are
//! plain strings at heart: [`Error`]'s `Display` output is exactly what `geom(8)` would print.
//!
//! # Testing without a kernel
//!
//! [`Request::issue_with`] takes any [`Transport`]. [`Loopback`] implements the kernel's half of
//! the protocol in-process, dispatching requests to handlers registered per class.
//!
//! # Safety
//!
//! The kernel reads every parameter and may write every read-write parameter, through raw
//! pointers carried in the request. This crate ties those pointers to borrows with the lifetime
//! of the [`Request`], so the values stay valid (and read-write values stay exclusively borrowed)
//! until the request is dropped. What the kernel does with them is up to the GEOM class the
//! request is addressed to.

#[doc = include_str!("../README.md")]
mod readme {}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[path = "platform/linux.rs"]
mod platform;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd",
    target_os = "netbsd",
))]
#[path = "platform/bsd.rs"]
mod platform;

pub mod consts;
mod dump;
mod error;
pub mod ioctl;
mod param;
mod request;
pub mod served;
mod transport;
pub mod wire;

pub use dump::dump;
pub use error::Error;
pub use param::{Param, ParamFlags, Value};
pub use request::Request;
pub use served::{Loopback, Served};
pub use transport::{Device, Transport};

/// Issues `req` to the GEOM control device.
///
/// A missing request is reported as "NULL request pointer" rather than silently succeeding.
///
/// ```
/// assert_eq!(gctl::issue(None).unwrap_err().to_string(), "NULL request pointer");
/// ```
pub fn issue(req: Option<&mut Request<'_>>) -> Result<(), Error> {
    match req {
        Some(req) => req.issue(),
        None => Err(Error::NullRequest),
    }
}

/// Releases a request: its parameter names, its error buffer, and the request itself.
///
/// Borrowed values are returned to the caller untouched. Passing `None` does nothing.
pub fn free(req: Option<Request<'_>>) {
    drop(req);
}
