use std::io::{self, Read};

/// Read filter dropping the spaces that LSF pads before each line terminator.
///
/// Runs of spaces are held back until the next byte is known, so padding
/// split across two reads of the inner reader is still removed. Spaces at the
/// very end of the stream (no terminator follows) are kept.
pub struct TrimReader<R> {
    inner: R,
    scratch: Vec<u8>,
    out: Vec<u8>,
    pos: usize,
    spaces: usize,
    cr: bool,
    eof: bool,
}

impl<R: Read> TrimReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            scratch: vec![0; 8 * 1024],
            out: Vec::new(),
            pos: 0,
            spaces: 0,
            cr: false,
            eof: false,
        }
    }

    fn flush_pending(&mut self) {
        self.out.extend(std::iter::repeat_n(b' ', self.spaces));
        self.spaces = 0;
        if self.cr {
            self.out.push(b'\r');
            self.cr = false;
        }
    }

    fn push(&mut self, byte: u8) {
        match byte {
            b'\n' => {
                self.spaces = 0;
                if self.cr {
                    self.out.push(b'\r');
                    self.cr = false;
                }
                self.out.push(b'\n');
            }
            b'\r' => {
                if self.cr {
                    self.flush_pending();
                }
                self.cr = true;
            }
            b' ' => {
                if self.cr {
                    self.flush_pending();
                }
                self.spaces += 1;
            }
            other => {
                self.flush_pending();
                self.out.push(other);
            }
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        self.out.clear();
        self.pos = 0;

        while self.out.is_empty() && !self.eof {
            let n = self.inner.read(&mut self.scratch)?;
            if n == 0 {
                self.eof = true;
                self.flush_pending();
                break;
            }
            let chunk = std::mem::take(&mut self.scratch);
            for &byte in chunk.iter().take(n) {
                self.push(byte);
            }
            self.scratch = chunk;
        }

        Ok(())
    }
}

impl<R: Read> Read for TrimReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.out.len() {
            self.fill()?;
        }

        let pending = self.out.get(self.pos..).unwrap_or_default();
        let n = pending.len().min(buf.len());
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), pending.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos += n;
        Ok(n)
    }
}
