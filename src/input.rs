use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::Result;

/// Unified input reader handling file and pipe input with buffered reads.
pub struct InputReader {
    reader: Box<dyn Read>,
    is_pipe: bool,
}

impl InputReader {
    /// Create a reader from a path; "-" selects stdin.
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let is_pipe = input_path.as_ref().to_string_lossy() == "-";

        let reader: Box<dyn Read> = if is_pipe {
            Box::new(io::stdin().lock())
        } else {
            Box::new(BufReader::new(File::open(input_path)?))
        };

        Ok(Self { reader, is_pipe })
    }

    /// Read one chunk; 0 indicates EOF.
    pub fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.reader.read(buffer)?)
    }

    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Process the stream in chunks. The callback returns Ok(true) to
    /// continue or Ok(false) to stop early.
    pub fn process_chunks<F>(&mut self, chunk_size: usize, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<bool>,
    {
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let bytes_read = self.read_chunk(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }

            if !callback(&buffer[..bytes_read])? {
                break;
            }
        }

        Ok(())
    }
}
