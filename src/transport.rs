//! Carrying a request to the remote side and back.

use std::{
    ffi::CStr,
    fs::File,
    io,
    path::{Path, PathBuf},
};

use errno::Errno;

use crate::{
    Error, Request,
    consts::{ERROR_BUF_LEN, PATH_GEOM_CTL},
    wire::{GEOM_CTL, GctlReq, Wire},
};

/// The far side of a control request.
///
/// [`Request::issue_with`] opens the endpoint, submits the marshalled request exactly once, and
/// closes it again by dropping the handle.
pub trait Transport {
    /// An open connection to the endpoint; dropping it closes the connection.
    type Handle;

    /// Opens the endpoint for a single submission.
    fn open(&mut self) -> Result<Self::Handle, Errno>;

    /// Submits a marshalled request.
    ///
    /// The remote side reports diagnostics by writing a NUL-terminated string of at most
    /// `req.lerror` bytes into `req.error`. An `Err` without such a diagnostic is reported to the
    /// caller as the OS error.
    ///
    /// # Safety
    ///
    /// Every pointer in `req` must be valid for the lengths it is paired with, and value buffers of
    /// parameters carrying `WR` must be writable.
    unsafe fn submit(&mut self, handle: &mut Self::Handle, req: &mut GctlReq) -> Result<(), Errno>;
}

/// The GEOM control device.
#[derive(Debug, Clone)]
pub struct Device {
    path: PathBuf,
}

impl Default for Device {
    fn default() -> Self {
        Self::with_path(PATH_GEOM_CTL)
    }
}

impl Device {
    /// Uses a control node at a non-standard path.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The node this device opens.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transport for Device {
    type Handle = File;

    fn open(&mut self) -> Result<File, Errno> {
        File::open(&self.path).map_err(|e| os_errno(&e))
    }

    unsafe fn submit(&mut self, handle: &mut File, req: &mut GctlReq) -> Result<(), Errno> {
        unsafe { GEOM_CTL.ioctl(&*handle, req as *const GctlReq) }
            .map(drop)
            .map_err(|e| os_errno(&e))
    }
}

fn os_errno(e: &io::Error) -> Errno {
    match (e.raw_os_error(), e.kind()) {
        (Some(code), _) => Errno(code),
        // e.g. a path with an interior NUL, rejected before reaching the OS
        (None, io::ErrorKind::InvalidInput) => Errno(libc::EINVAL),
        (None, _) => Errno(libc::EIO),
    }
}

impl Request<'_> {
    /// Issues the request to the GEOM control device.
    ///
    /// Blocks until the kernel has completed the operation. Read-write parameters may have been
    /// overwritten once this returns, successfully or not.
    ///
    /// # Errors
    ///
    /// - the latched error, if building the request failed;
    /// - "Could not allocate memory" if the error buffer could not be allocated;
    /// - the OS error if `/dev/geom.ctl` cannot be opened;
    /// - the kernel's diagnostic, if it wrote one;
    /// - otherwise the OS error of a failed `ioctl`.
    pub fn issue(&mut self) -> Result<(), Error> {
        self.issue_with(&mut Device::default())
    }

    /// Issues the request through an arbitrary [`Transport`].
    ///
    /// The protocol version is stamped and a fresh error buffer is allocated on every call, so a
    /// request can technically be issued again. The buffer stays owned by the request and is
    /// released with it.
    ///
    /// # Example
    ///
    /// ```
    /// use gctl::{Device, Request};
    ///
    /// let mut req = Request::new();
    /// req.ro_str("class", c"MIRROR");
    /// let err = req
    ///     .issue_with(&mut Device::with_path("/nonexistent/geom.ctl"))
    ///     .unwrap_err();
    /// assert_eq!(err.errno(), Some(errno::Errno(libc::ENOENT)));
    /// ```
    pub fn issue_with<T: Transport>(&mut self, transport: &mut T) -> Result<(), Error> {
        if let Some(error) = &self.error {
            return Err(Error::Latched(error.clone()));
        }

        let mut buf = Vec::new();
        if buf.try_reserve_exact(ERROR_BUF_LEN).is_err() {
            return Err(self.latch_alloc_failure());
        }
        buf.resize(ERROR_BUF_LEN, 0);
        let buf = self.error_buf.insert(buf);

        let Ok(mut wire) = Wire::build(&mut self.params, buf) else {
            return Err(self.latch_alloc_failure());
        };

        log::debug!(
            "issuing gctl request {:p} with {} params",
            self,
            self.params.len()
        );

        let mut handle = transport.open().map_err(Error::Open)?;
        let res = unsafe { transport.submit(&mut handle, wire.req_mut()) };
        drop(handle);
        drop(wire);

        if let Some(msg) = self.remote_error() {
            log::debug!("gctl request {:p}: remote error \"{msg}\"", self);
            return Err(Error::Remote(msg));
        }
        res.map_err(Error::Ioctl)
    }

    fn latch_alloc_failure(&mut self) -> Error {
        self.alloc_failed();
        Error::Latched(self.error.clone().unwrap_or_default())
    }

    /// The diagnostic the remote side left in the error buffer, if it is non-empty.
    pub(crate) fn remote_error(&self) -> Option<String> {
        let buf = self.error_buf.as_deref()?;
        let msg = CStr::from_bytes_until_nul(buf).ok()?;
        if msg.is_empty() {
            None
        } else {
            Some(msg.to_string_lossy().into_owned())
        }
    }
}
