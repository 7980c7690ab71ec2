use crate::infrastructure::serial::SerialLink;
use std::io;
use std::time::Duration;

/// Longest run of bytes held back while waiting for a terminator
pub const MAX_LINE_LEN: usize = 64 * 1024;

const READ_CHUNK: usize = 1024;

/// Take the first complete line out of `pending`.
///
/// The terminator (`\n`, optionally preceded by `\r`) is removed. Bytes are
/// decoded as UTF-8, replacing invalid sequences. When no terminator has
/// arrived but `pending` has reached [`MAX_LINE_LEN`], the buffer is returned
/// as one line, minus a trailing partial UTF-8 character. A trailing `\r` is
/// held until the next byte shows whether it starts a `\r\n`.
pub fn split_line(pending: &mut Vec<u8>) -> Option<String> {
    let line: Vec<u8> = match pending.iter().position(|&b| b == b'\n') {
        Some(pos) => {
            let mut line: Vec<u8> = pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        }
        None if pending.len() >= MAX_LINE_LEN => {
            let end = flush_len(pending)?;
            pending.drain(..end).collect()
        }
        None => return None,
    };
    Some(String::from_utf8_lossy(&line).into_owned())
}

/// How much of an overlong `pending` to flush, or `None` to wait for one more byte
fn flush_len(pending: &[u8]) -> Option<usize> {
    if pending.last() == Some(&b'\r') && pending.len() < 2 * MAX_LINE_LEN {
        return None;
    }

    let end = pending.len();
    let tail = end.saturating_sub(3);
    let cut = match (tail..end).rev().find(|&i| pending[i] & 0xC0 != 0x80) {
        Some(lead) if end - lead < utf8_width(pending[lead]) => lead,
        _ => end,
    };
    Some(if cut == 0 { end } else { cut })
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

/// Receiving half of a session plus the bytes of a partially received line
pub(crate) struct LineReader {
    link: Option<Box<dyn SerialLink>>,
    pending: Vec<u8>,
    chunk: Box<[u8]>,
    applied_timeout: Option<Duration>,
}

impl LineReader {
    pub(crate) fn new(link: Box<dyn SerialLink>) -> Self {
        Self {
            link: Some(link),
            pending: Vec::new(),
            chunk: vec![0u8; READ_CHUNK].into_boxed_slice(),
            applied_timeout: None,
        }
    }

    /// Next complete line and the number of raw bytes it used up
    pub(crate) fn take_line(&mut self) -> Option<(String, usize)> {
        let before = self.pending.len();
        split_line(&mut self.pending).map(|line| (line, before - self.pending.len()))
    }

    /// Block up to `wait` for more bytes. A timeout is `Ok(0)`.
    pub(crate) fn fill(&mut self, wait: Duration) -> io::Result<usize> {
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port released"))?;

        if self.applied_timeout != Some(wait) {
            link.set_read_timeout(wait)?;
            self.applied_timeout = Some(wait);
        }

        match link.read(&mut self.chunk) {
            Ok(n) => {
                self.pending.extend_from_slice(&self.chunk[..n]);
                Ok(n)
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the OS handle now rather than when the last reference goes away
    pub(crate) fn release(&mut self) {
        self.link = None;
        self.pending.clear();
    }
}
