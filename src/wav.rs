use std::io::{self, BufWriter, Seek, SeekFrom, Write};

/// RIFF/WAVE writer for 16-bit PCM payloads.
///
/// IEC 61937 burst streams are shaped like 16-bit stereo PCM, so wrapping
/// them in a plain WAV container lets any PCM-capable player deliver them
/// to a receiver bit-exactly.
pub struct WavWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    riff_size_position: u64,
    data_size_position: u64,
    data_written: u32,
    sample_rate: u32,
    channels: u16,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            riff_size_position: 0,
            data_size_position: 0,
            data_written: 0,
            sample_rate: 48000,
            channels: 2,
        }
    }

    /// Configure format parameters; only valid before any data is written.
    pub fn configure(&mut self, sample_rate: u32, channels: u16) -> io::Result<()> {
        if self.data_written > 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot change format after writing data",
            ));
        }

        self.sample_rate = sample_rate;
        self.channels = channels;
        Ok(())
    }

    /// Write the RIFF header with placeholder sizes.
    pub fn write_header(&mut self) -> io::Result<()> {
        const BITS_PER_SAMPLE: u16 = 16;

        self.writer.write_all(b"RIFF")?;
        self.riff_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // patched by finish()
        self.writer.write_all(b"WAVE")?;

        self.writer.write_all(b"fmt ")?;
        self.writer.write_all(&16u32.to_le_bytes())?;
        self.writer.write_all(&1u16.to_le_bytes())?; // PCM
        self.writer.write_all(&self.channels.to_le_bytes())?;
        self.writer.write_all(&self.sample_rate.to_le_bytes())?;

        let byte_rate = self.sample_rate * u32::from(self.channels) * 2;
        self.writer.write_all(&byte_rate.to_le_bytes())?;

        let block_align = self.channels * (BITS_PER_SAMPLE / 8);
        self.writer.write_all(&block_align.to_le_bytes())?;
        self.writer.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

        self.writer.write_all(b"data")?;
        self.data_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // patched by finish()

        Ok(())
    }

    /// Append payload bytes to the data chunk.
    pub fn write_data(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.data_written += data.len() as u32;
        Ok(())
    }

    /// Patch the chunk sizes and flush.
    pub fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        let end = self.writer.stream_position()?;

        self.writer.seek(SeekFrom::Start(self.riff_size_position))?;
        self.writer
            .write_all(&((end - 8) as u32).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer.write_all(&self.data_written.to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        Ok(())
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }

    pub fn data_written(&self) -> u32 {
        self.data_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_and_size_patching() -> io::Result<()> {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()));
        writer.configure(48000, 2)?;
        writer.write_header()?;
        writer.write_data(&[0u8; 100])?;
        writer.finish()?;

        let buffer = writer.into_inner()?.into_inner();

        assert_eq!(&buffer[0..4], b"RIFF");
        assert_eq!(&buffer[8..12], b"WAVE");
        assert_eq!(&buffer[12..16], b"fmt ");
        assert_eq!(&buffer[36..40], b"data");

        let riff_size = u32::from_le_bytes(buffer[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, buffer.len() - 8);

        let data_size = u32::from_le_bytes(buffer[40..44].try_into().unwrap());
        assert_eq!(data_size, 100);

        let rate = u32::from_le_bytes(buffer[24..28].try_into().unwrap());
        assert_eq!(rate, 48000);

        Ok(())
    }

    #[test]
    fn configure_after_data_is_rejected() -> io::Result<()> {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()));
        writer.write_header()?;
        writer.write_data(&[0u8; 4])?;

        assert!(writer.configure(44100, 2).is_err());
        Ok(())
    }
}
