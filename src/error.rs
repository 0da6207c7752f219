use errno::Errno;

use crate::consts::NULL_REQUEST_MSG;

/// Failure of a control request.
///
/// The [`Display`](std::fmt::Display) output of every variant is the bare diagnostic string a
/// `geom(8)`-style tool prints, without any decoration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request was issued through a null handle.
    #[error("{}", NULL_REQUEST_MSG)]
    NullRequest,
    /// An error latched on the request while it was being built, or while the error buffer was
    /// being allocated.
    #[error("{0}")]
    Latched(String),
    /// The control device could not be opened.
    #[error("{0}")]
    Open(Errno),
    /// The remote side wrote a diagnostic into the error buffer.
    #[error("{0}")]
    Remote(String),
    /// The transport call failed and the remote side left no diagnostic.
    #[error("{0}")]
    Ioctl(Errno),
}

impl Error {
    /// Returns the OS error code behind this error, if there is one.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Self::Open(e) | Self::Ioctl(e) => Some(*e),
            Self::NullRequest | Self::Latched(_) | Self::Remote(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_bare() {
        assert_eq!(Error::NullRequest.to_string(), "NULL request pointer");
        assert_eq!(Error::Remote("Verb missing".into()).to_string(), "Verb missing");

        let open = Error::Open(Errno(libc::ENOENT));
        assert_eq!(open.to_string(), Errno(libc::ENOENT).to_string());
        assert!(!open.to_string().contains("os error"));
        assert_eq!(open.errno(), Some(Errno(libc::ENOENT)));
        assert_eq!(Error::Latched("x".into()).errno(), None);
    }
}
