//! Human-readable dumps of requests, for debugging.

use std::io::{self, Write};

use crate::{
    Request,
    param::{Param, ParamFlags},
};

impl Request<'_> {
    /// Writes the request, its error state, and every parameter in order to `out`.
    ///
    /// ASCII parameters are shown as strings, other non-empty values as hex bytes, and empty
    /// values as the address they point to.
    ///
    /// ```
    /// use gctl::Request;
    ///
    /// let mut req = Request::new();
    /// req.ro_param("verb", -1, b"status\0");
    /// req.ro_bytes("mask", &[0x0f, 0xa0]);
    ///
    /// let mut out = Vec::new();
    /// req.dump(&mut out).unwrap();
    /// let out = String::from_utf8(out).unwrap();
    /// assert!(out.contains("  error:\tNULL\n"));
    /// assert!(out.contains("  param:\t\"verb\" (5) [R7] = \"status\"\n"));
    /// assert!(out.contains("  param:\t\"mask\" (5) [R2] = 0f a0\n"));
    /// ```
    pub fn dump(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "Dump of gctl request at {:p}:", self)?;
        match self.error.as_deref().map(String::from).or_else(|| self.remote_error()) {
            Some(error) => writeln!(out, "  error:\t\"{error}\"")?,
            None if self.error_buf.is_some() => writeln!(out, "  error:\t\"\"")?,
            None => writeln!(out, "  error:\tNULL")?,
        }
        for p in &self.params {
            dump_param(p, out)?;
        }
        Ok(())
    }
}

fn dump_param(p: &Param<'_>, out: &mut impl Write) -> io::Result<()> {
    let flags = p.flags();
    write!(
        out,
        "  param:\t\"{}\" ({}) [{}{}{}]",
        p.name().to_string_lossy(),
        p.name_len(),
        if flags.contains(ParamFlags::RD) { "R" } else { "" },
        if flags.contains(ParamFlags::WR) { "W" } else { "" },
        p.len(),
    )?;
    let value = p.value();
    if flags.contains(ParamFlags::ASCII) {
        let text = value.split(|&b| b == 0).next().unwrap_or_default();
        write!(out, " = \"{}\"", String::from_utf8_lossy(text))?;
    } else if !value.is_empty() {
        write!(out, " =")?;
        for b in value {
            write!(out, " {b:02x}")?;
        }
    } else {
        write!(out, " = {:p}", p.value.as_ptr())?;
    }
    writeln!(out)
}

/// Dumps `req`, or a single sentinel line if there is no request.
pub fn dump(req: Option<&Request<'_>>, out: &mut impl Write) -> io::Result<()> {
    match req {
        Some(req) => req.dump(out),
        None => writeln!(out, "Dump of gctl request at NULL"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(req: Option<&Request<'_>>) -> String {
        let mut out = Vec::new();
        dump(req, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn null_request() {
        assert_eq!(render(None), "Dump of gctl request at NULL\n");
    }

    #[test]
    fn parameters() {
        let mut result = [0u8; 4];
        let mut req = Request::new();
        req.ro_param("verb", -1, b"status\0");
        req.rw_param("result", 4, &mut result);
        req.ro_param("empty", 0, b"");

        let out = render(Some(&req));
        let lines: Vec<_> = out.lines().collect();
        assert!(lines[0].starts_with("Dump of gctl request at 0x"));
        assert_eq!(lines[1], "  error:\tNULL");
        assert_eq!(lines[2], "  param:\t\"verb\" (5) [R7] = \"status\"");
        assert_eq!(lines[3], "  param:\t\"result\" (7) [RW4] = 00 00 00 00");
        assert!(lines[4].starts_with("  param:\t\"empty\" (6) [R0] = 0x"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn latched_error() {
        let mut req = Request::new();
        req.ro_param("x", 3, b"1");
        let out = render(Some(&req));
        assert!(out.contains("  error:\t\"Parameter x: length 3 exceeds 1-byte buffer\"\n"));
    }

    #[test]
    fn dump_does_not_mutate() {
        let mut req = Request::new();
        req.ro_str("a", c"b");
        let first = render(Some(&req));
        assert_eq!(render(Some(&req)), first);
        assert_eq!(req.len(), 1);
        assert!(req.error().is_none());
    }
}
