//! Fixed-width binary marshalling.
//!
//! DCD blocks are written in native byte order, exactly `size_of::<T>()` bytes
//! per value with no padding. TRR uses XDR, which is big-endian and pads
//! opaque data to four bytes. Nothing outside the codec layer touches raw bytes.

use std::io::{self, Read, Write};

/// Fixed-width arithmetic types that can be marshalled byte-for-byte.
pub trait BinaryScalar: Copy {
    const SIZE: usize;

    fn write_ne(self, writer: &mut impl Write) -> io::Result<()>;
    fn write_be(self, writer: &mut impl Write) -> io::Result<()>;
    fn from_ne_slice(bytes: &[u8]) -> Self;
    fn from_be_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_binary_scalar {
    ($($t:ty),*) => {$(
        impl BinaryScalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn write_ne(self, writer: &mut impl Write) -> io::Result<()> {
                writer.write_all(&self.to_ne_bytes())
            }

            fn write_be(self, writer: &mut impl Write) -> io::Result<()> {
                writer.write_all(&self.to_be_bytes())
            }

            fn from_ne_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..Self::SIZE]);
                <$t>::from_ne_bytes(buf)
            }

            fn from_be_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..Self::SIZE]);
                <$t>::from_be_bytes(buf)
            }
        }
    )*};
}

impl_binary_scalar!(i32, u32, i64, f32, f64);

/// Writes the native in-memory representation of `value`.
pub fn write_as_binary<T: BinaryScalar>(writer: &mut impl Write, value: T) -> io::Result<()> {
    value.write_ne(writer)
}

/// Reads exactly `size_of::<T>()` bytes in native order.
///
/// A short read is reported as [`io::ErrorKind::UnexpectedEof`], never
/// zero-filled.
pub fn read_binary_as<T: BinaryScalar>(reader: &mut impl Read) -> io::Result<T> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf[..T::SIZE])?;
    Ok(T::from_ne_slice(&buf))
}

pub fn write_xdr<T: BinaryScalar>(writer: &mut impl Write, value: T) -> io::Result<()> {
    value.write_be(writer)
}

pub fn read_xdr<T: BinaryScalar>(reader: &mut impl Read) -> io::Result<T> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf[..T::SIZE])?;
    Ok(T::from_be_slice(&buf))
}

fn xdr_padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// XDR string: big-endian length, bytes, zero padding to a 4-byte boundary.
pub fn write_xdr_string(writer: &mut impl Write, value: &str) -> io::Result<()> {
    let bytes = value.as_bytes();
    write_xdr(writer, bytes.len() as i32)?;
    writer.write_all(bytes)?;
    writer.write_all(&[0u8; 4][..xdr_padding(bytes.len())])
}

pub fn read_xdr_string(reader: &mut impl Read) -> io::Result<String> {
    let len: i32 = read_xdr(reader)?;
    if len < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("negative XDR string length {}", len),
        ));
    }
    let len = len as usize;
    let total = (len + xdr_padding(len)) as u64;
    let mut buf = Vec::new();
    Read::take(&mut *reader, total).read_to_end(&mut buf)?;
    if (buf.len() as u64) < total {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("XDR string declares {} bytes, found {}", len, buf.len()),
        ));
    }
    buf.truncate(len);
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
