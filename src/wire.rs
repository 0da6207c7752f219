//! The records handed to the kernel, laid out as in `geom/geom_ctl.h`.
//!
//! ```c
//! struct gctl_req_arg {
//! 	u_int				nlen;
//! 	char				*name;
//! 	off_t				offset;
//! 	int				flag;
//! 	int				len;
//! 	void				*value;
//! 	/* kernel only fields */
//! 	void				*kvalue;
//! };
//!
//! struct gctl_req {
//! 	u_int				version;
//! 	u_int				serial;
//! 	u_int				narg;
//! 	struct gctl_req_arg		*arg;
//! 	u_int				lerror;
//! 	char				*error;
//! 	struct gctl_req_table		*reqt;
//!
//! 	/* kernel only fields */
//! 	int				nerror;
//! 	struct sbuf			*serror;
//! };
//! ```

use std::{
    collections::TryReserveError,
    ffi::{c_char, c_int, c_uint, c_void},
    ptr,
};

use crate::{
    consts::GCTL_VERSION,
    ioctl::{_IOW, Ioctl},
    param::Param,
};

/// `struct gctl_req_arg`: one parameter descriptor.
#[repr(C)]
#[derive(Debug)]
pub struct GctlReqArg {
    /// Length of `name`, including its NUL.
    pub nlen: c_uint,
    pub name: *mut c_char,
    /// Unused by this protocol version; always 0.
    pub offset: libc::off_t,
    /// [`ParamFlags`](crate::ParamFlags) bits.
    pub flag: c_int,
    /// Length of `value` in bytes.
    pub len: c_int,
    pub value: *mut c_void,
    /// Kernel-side copy of `value`; null on the way in.
    pub kvalue: *mut c_void,
}

/// `struct gctl_req`: the request header passed to [`GEOM_CTL`].
#[repr(C)]
#[derive(Debug)]
pub struct GctlReq {
    /// Must equal [`GCTL_VERSION`].
    pub version: c_uint,
    pub serial: c_uint,
    /// Number of records at `arg`.
    pub narg: c_uint,
    pub arg: *mut GctlReqArg,
    /// Capacity of `error`, not counting the byte that is always left NUL.
    pub lerror: c_uint,
    /// Buffer the remote side writes its diagnostic into.
    pub error: *mut c_char,
    pub reqt: *mut c_void,
    /// Kernel only: the error code of the request.
    pub nerror: c_int,
    /// Kernel only.
    pub serror: *mut c_void,
}

/// The one `ioctl` of the GEOM control device.
pub const GEOM_CTL: Ioctl<*const GctlReq> = _IOW(b'G', GCTL_VERSION as u8);

/// A marshalled request: the header plus the argument array it points into.
///
/// Every pointer in here borrows from the [`Param`]s and the error buffer it was built from, so
/// it must not outlive them.
pub(crate) struct Wire {
    req: GctlReq,
    _args: Vec<GctlReqArg>,
}

impl Wire {
    /// Lays out `params` and `error_buf` for the kernel.
    ///
    /// The advertised error capacity is one less than the buffer, so the last byte stays NUL no
    /// matter what the remote side writes.
    pub(crate) fn build(
        params: &mut [Param<'_>],
        error_buf: &mut [u8],
    ) -> Result<Self, TryReserveError> {
        let mut args = Vec::new();
        args.try_reserve_exact(params.len())?;
        for p in params.iter_mut() {
            let flag = p.flags().bits();
            args.push(GctlReqArg {
                nlen: p.name_len() as c_uint,
                name: p.name.as_ptr().cast_mut(),
                offset: 0,
                flag,
                // Bounded by `c_int::MAX` when the parameter was added.
                len: p.value.len() as c_int,
                value: p.value.as_wire_ptr().cast(),
                kvalue: ptr::null_mut(),
            });
        }

        let req = GctlReq {
            version: GCTL_VERSION,
            serial: 0,
            narg: args.len() as c_uint,
            arg: args.as_mut_ptr(),
            lerror: error_buf.len().saturating_sub(1) as c_uint,
            error: error_buf.as_mut_ptr().cast(),
            reqt: ptr::null_mut(),
            nerror: 0,
            serror: ptr::null_mut(),
        };
        Ok(Self { req, _args: args })
    }

    pub(crate) fn req_mut(&mut self) -> &mut GctlReq {
        &mut self.req
    }
}
