//! This module provides implementations for basic encoders: little endian
//! and big endian.

use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use std::io::{self, Write};

/// Type trait for writing binary numbers in a specific byte order.
pub trait BasicEncode {
    /// Retrieve the destination's endianness, as expected by this encoder.
    fn endianness(&self) -> Endianness;

    /// Encode an unsigned short value to the given destination.
    fn encode_us<W>(&self, to: W, value: u16) -> io::Result<()>
    where
        W: Write;

    /// Encode an unsigned long value to the given destination.
    fn encode_ul<W>(&self, to: W, value: u32) -> io::Result<()>
    where
        W: Write;

    /// Encode a signed short value to the given destination.
    fn encode_ss<W>(&self, to: W, value: i16) -> io::Result<()>
    where
        W: Write;

    /// Encode a signed long value to the given destination.
    fn encode_sl<W>(&self, to: W, value: i32) -> io::Result<()>
    where
        W: Write;

    /// Encode a single precision float value to the given destination.
    fn encode_fl<W>(&self, to: W, value: f32) -> io::Result<()>
    where
        W: Write;

    /// Encode a double precision float value to the given destination.
    fn encode_fd<W>(&self, to: W, value: f64) -> io::Result<()>
    where
        W: Write;
}

/// A basic encoder of DICOM primitive values in little endian.
#[derive(Debug, Default, Clone, Copy)]
pub struct LittleEndianBasicEncoder;

impl BasicEncode for LittleEndianBasicEncoder {
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn encode_us<W>(&self, mut to: W, value: u16) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        to.write_all(&buf)
    }

    fn encode_ul<W>(&self, mut to: W, value: u32) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, value);
        to.write_all(&buf)
    }

    fn encode_ss<W>(&self, mut to: W, value: i16) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 2];
        LittleEndian::write_i16(&mut buf, value);
        to.write_all(&buf)
    }

    fn encode_sl<W>(&self, mut to: W, value: i32) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 4];
        LittleEndian::write_i32(&mut buf, value);
        to.write_all(&buf)
    }

    fn encode_fl<W>(&self, mut to: W, value: f32) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 4];
        LittleEndian::write_f32(&mut buf, value);
        to.write_all(&buf)
    }

    fn encode_fd<W>(&self, mut to: W, value: f64) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 8];
        LittleEndian::write_f64(&mut buf, value);
        to.write_all(&buf)
    }
}

/// A basic encoder of DICOM primitive values in big endian.
#[derive(Debug, Default, Clone, Copy)]
pub struct BigEndianBasicEncoder;

impl BasicEncode for BigEndianBasicEncoder {
    fn endianness(&self) -> Endianness {
        Endianness::Big
    }

    fn encode_us<W>(&self, mut to: W, value: u16) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, value);
        to.write_all(&buf)
    }

    fn encode_ul<W>(&self, mut to: W, value: u32) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, value);
        to.write_all(&buf)
    }

    fn encode_ss<W>(&self, mut to: W, value: i16) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 2];
        BigEndian::write_i16(&mut buf, value);
        to.write_all(&buf)
    }

    fn encode_sl<W>(&self, mut to: W, value: i32) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 4];
        BigEndian::write_i32(&mut buf, value);
        to.write_all(&buf)
    }

    fn encode_fl<W>(&self, mut to: W, value: f32) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 4];
        BigEndian::write_f32(&mut buf, value);
        to.write_all(&buf)
    }

    fn encode_fd<W>(&self, mut to: W, value: f64) -> io::Result<()>
    where
        W: Write,
    {
        let mut buf = [0u8; 8];
        BigEndian::write_f64(&mut buf, value);
        to.write_all(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_both_orders() {
        let mut out = Vec::new();
        LittleEndianBasicEncoder.encode_us(&mut out, 0x00CA).unwrap();
        BigEndianBasicEncoder.encode_us(&mut out, 0x00CA).unwrap();
        assert_eq!(out, [0xCA, 0x00, 0x00, 0xCA]);

        let mut out = Vec::new();
        LittleEndianBasicEncoder.encode_ul(&mut out, 0x0102_0304).unwrap();
        assert_eq!(out, [0x04, 0x03, 0x02, 0x01]);
    }
}
