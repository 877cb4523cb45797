use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// One frame's worth of file data.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: u64,
    pub data: Vec<u8>,
}

/// Reads a source strictly sequentially in `chunk_size` pieces.
///
/// Every chunk is exactly `chunk_size` bytes except possibly the last; an
/// empty source yields nothing.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    next_index: u64,
    done: bool,
}

impl ChunkReader<BufReader<File>> {
    pub fn open(path: &Path, chunk_size: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(chunk_size, file), chunk_size))
    }
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size,
            next_index: 0,
            done: false,
        }
    }

    fn fill(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;

        // Read exactly chunk_size bytes (or until EOF)
        while filled < self.chunk_size {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.fill() {
            Ok(data) if data.is_empty() => {
                self.done = true;
                None
            }
            Ok(data) => {
                // A short read means EOF was reached
                self.done = data.len() < self.chunk_size;
                let index = self.next_index;
                self.next_index += 1;
                Some(Ok(Chunk { index, data }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
