//! Protocol constants shared by both halves of the control-request protocol.
//!
//! Adapted from `geom/geom_ctl.h`.

/// Protocol version stamped onto every request right before it is issued.
///
/// The remote side rejects requests carrying any other version.
pub const GCTL_VERSION: u32 = 2;

/// Path of the GEOM control device.
pub const PATH_GEOM_CTL: &str = "/dev/geom.ctl";

/// Size of the error buffer allocated for each issue, including the byte reserved for the
/// terminating NUL.
pub const ERROR_BUF_LEN: usize = 1024;

/// Longest parameter name (including its NUL) the remote side accepts.
pub const SPECNAMELEN: u32 = 255;

/// Largest number of parameters the remote side accepts in a single request.
pub const GCTL_MAX_ARGS: u32 = 2048;

/// Message latched on a request whenever an allocation fails.
pub const ENOMEM_MSG: &str = "Could not allocate memory";

/// Message returned when issuing through a null request handle.
pub const NULL_REQUEST_MSG: &str = "NULL request pointer";
