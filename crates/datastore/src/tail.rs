//! Backward iteration over newline-delimited records.

use std::io::{self, Read, Seek, SeekFrom};

const CHUNK_SIZE: usize = 8 * 1024;

/// Yields the records of a newline-delimited log from last to first, together
/// with the byte offset each record starts at.
///
/// The reader is consumed in fixed-size chunks from the end, so reading the
/// last few records of a large log touches only its tail. Empty lines are
/// skipped.
pub(crate) struct RevLines<R> {
    reader: R,
    /// Bytes before this offset have not been read yet.
    pos: u64,
    /// Bytes `[pos, pos + pending.len())` read but not yet yielded.
    pending: Vec<u8>,
    chunk_size: usize,
}

impl<R: Read + Seek> RevLines<R> {
    pub fn new(mut reader: R) -> io::Result<Self> {
        let pos = reader.seek(SeekFrom::End(0))?;
        Ok(Self {
            reader,
            pos,
            pending: Vec::new(),
            chunk_size: CHUNK_SIZE,
        })
    }

    #[cfg(test)]
    fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    fn read_prev_chunk(&mut self) -> io::Result<()> {
        let len = self.pos.min(self.chunk_size as u64);
        let start = self.pos - len;
        let mut chunk = vec![0u8; len as usize];
        self.reader.seek(SeekFrom::Start(start))?;
        self.reader.read_exact(&mut chunk)?;
        chunk.append(&mut self.pending);
        self.pending = chunk;
        self.pos = start;
        Ok(())
    }
}

impl<R: Read + Seek> Iterator for RevLines<R> {
    type Item = io::Result<(u64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(idx) = self.pending.iter().rposition(|&b| b == b'\n') {
                let line = self.pending.split_off(idx + 1);
                self.pending.truncate(idx);
                if line.is_empty() {
                    continue;
                }
                return Some(Ok((self.pos + idx as u64 + 1, line)));
            }

            if self.pos == 0 {
                if self.pending.is_empty() {
                    return None;
                }
                return Some(Ok((0, std::mem::take(&mut self.pending))));
            }

            if let Err(e) = self.read_prev_chunk() {
                return Some(Err(e));
            }
        }
    }
}
