//! Thin bit-level reader over a byte slice.
//!
//! Used where codec headers pack fields at sub-byte offsets and manual
//! shift/mask arithmetic would obscure the layout.

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, UnsignedInteger};

#[derive(Debug)]
pub struct BitSliceReader<'a> {
    bs: BitReader<io::Cursor<&'a [u8]>, BigEndian>,
    len: u64,
}

impl<'a> BitSliceReader<'a> {
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self {
            bs: BitReader::new(io::Cursor::new(data)),
            len: (data.len() as u64) << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        self.bs.read_unsigned_var(n)
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        self.bs.skip(n)
    }

    pub fn available(&mut self) -> io::Result<u64> {
        Ok(self.len - self.bs.position_in_bits()?)
    }
}

#[test]
fn field_extraction() -> io::Result<()> {
    let data = [0b1010_1100u8, 0b0101_0011];
    let mut reader = BitSliceReader::from_slice(&data);

    assert!(reader.get()?);
    assert_eq!(reader.get_n::<u8>(3)?, 0b010);
    reader.skip_n(4)?;
    assert_eq!(reader.get_n::<u16>(8)?, 0b0101_0011);
    assert_eq!(reader.available()?, 0);
    Ok(())
}
