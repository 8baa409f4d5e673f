//! This module provides implementations for basic decoders: little endian
//! and big endian.

use super::BasicDecode;
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use std::io::Read;

/// A basic decoder of DICOM primitive values in little endian.
#[derive(Debug, Default, Clone, Copy)]
pub struct LittleEndianBasicDecoder;

impl BasicDecode for LittleEndianBasicDecoder {
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    fn decode_us<S>(&self, mut source: S) -> std::io::Result<u16>
    where
        S: Read,
    {
        let mut buf = [0u8; 2];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_u16(&buf))
    }

    fn decode_ul<S>(&self, mut source: S) -> std::io::Result<u32>
    where
        S: Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_u32(&buf))
    }

    fn decode_ss<S>(&self, mut source: S) -> std::io::Result<i16>
    where
        S: Read,
    {
        let mut buf = [0u8; 2];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_i16(&buf))
    }

    fn decode_sl<S>(&self, mut source: S) -> std::io::Result<i32>
    where
        S: Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_i32(&buf))
    }

    fn decode_fl<S>(&self, mut source: S) -> std::io::Result<f32>
    where
        S: Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_f32(&buf))
    }

    fn decode_fd<S>(&self, mut source: S) -> std::io::Result<f64>
    where
        S: Read,
    {
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf)?;
        Ok(LittleEndian::read_f64(&buf))
    }
}

/// A basic decoder of DICOM primitive values in big endian.
#[derive(Debug, Default, Clone, Copy)]
pub struct BigEndianBasicDecoder;

impl BasicDecode for BigEndianBasicDecoder {
    fn endianness(&self) -> Endianness {
        Endianness::Big
    }

    fn decode_us<S>(&self, mut source: S) -> std::io::Result<u16>
    where
        S: Read,
    {
        let mut buf = [0u8; 2];
        source.read_exact(&mut buf)?;
        Ok(BigEndian::read_u16(&buf))
    }

    fn decode_ul<S>(&self, mut source: S) -> std::io::Result<u32>
    where
        S: Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(BigEndian::read_u32(&buf))
    }

    fn decode_ss<S>(&self, mut source: S) -> std::io::Result<i16>
    where
        S: Read,
    {
        let mut buf = [0u8; 2];
        source.read_exact(&mut buf)?;
        Ok(BigEndian::read_i16(&buf))
    }

    fn decode_sl<S>(&self, mut source: S) -> std::io::Result<i32>
    where
        S: Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(BigEndian::read_i32(&buf))
    }

    fn decode_fl<S>(&self, mut source: S) -> std::io::Result<f32>
    where
        S: Read,
    {
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf)?;
        Ok(BigEndian::read_f32(&buf))
    }

    fn decode_fd<S>(&self, mut source: S) -> std::io::Result<f64>
    where
        S: Read,
    {
        let mut buf = [0u8; 8];
        source.read_exact(&mut buf)?;
        Ok(BigEndian::read_f64(&buf))
    }
}

/// A basic decoder with support for both endiannesses, decided at run
/// time.
#[derive(Debug, Clone, Copy)]
pub enum BasicDecoder {
    /// Decode in little endian.
    LE(LittleEndianBasicDecoder),
    /// Decode in big endian.
    BE(BigEndianBasicDecoder),
}

impl From<Endianness> for BasicDecoder {
    fn from(endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => BasicDecoder::LE(LittleEndianBasicDecoder),
            Endianness::Big => BasicDecoder::BE(BigEndianBasicDecoder),
        }
    }
}

macro_rules! for_both {
    ($decoder:expr, |$e:ident| $f:expr) => {
        match $decoder {
            BasicDecoder::LE($e) => $f,
            BasicDecoder::BE($e) => $f,
        }
    };
}

impl BasicDecode for BasicDecoder {
    fn endianness(&self) -> Endianness {
        for_both!(self, |d| d.endianness())
    }

    fn decode_us<S>(&self, source: S) -> std::io::Result<u16>
    where
        S: Read,
    {
        for_both!(self, |d| d.decode_us(source))
    }

    fn decode_ul<S>(&self, source: S) -> std::io::Result<u32>
    where
        S: Read,
    {
        for_both!(self, |d| d.decode_ul(source))
    }

    fn decode_ss<S>(&self, source: S) -> std::io::Result<i16>
    where
        S: Read,
    {
        for_both!(self, |d| d.decode_ss(source))
    }

    fn decode_sl<S>(&self, source: S) -> std::io::Result<i32>
    where
        S: Read,
    {
        for_both!(self, |d| d.decode_sl(source))
    }

    fn decode_fl<S>(&self, source: S) -> std::io::Result<f32>
    where
        S: Read,
    {
        for_both!(self, |d| d.decode_fl(source))
    }

    fn decode_fd<S>(&self, source: S) -> std::io::Result<f64>
    where
        S: Read,
    {
        for_both!(self, |d| d.decode_fd(source))
    }
}
