//! Big-endian wire primitives.
//!
//! `ByteReader` is a sequential cursor over the connection: fixed-width
//! integers and floats, length-prefixed strings and arrays, with the
//! absent-length convention of [`weir_api::na::NA_LEN`]. `ByteWriter`
//! is the encoding mirror used by the client side and by tests.

use std::io::{Read, Write};

use weir_api::{na, IngestError, Limits};

// ═══════════════════════════════════════════════════════════════
//  ByteReader
// ═══════════════════════════════════════════════════════════════

pub struct ByteReader<R: Read> {
    src: R,
    limits: Limits,
}

impl<R: Read> ByteReader<R> {
    pub fn new(src: R, limits: Limits) -> Self {
        Self { src, limits }
    }

    /// Read one byte, or `None` on clean EOF. Only meaningful at a
    /// command boundary; inside a payload EOF is an error.
    pub fn try_get_u1(&mut self) -> Result<Option<u8>, IngestError> {
        let mut buf = [0u8; 1];
        match self.src.read_exact(&mut buf) {
            Ok(()) => Ok(Some(buf[0])),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_u1(&mut self) -> Result<u8, IngestError> {
        let mut buf = [0u8; 1];
        self.src.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, IngestError> {
        Ok(self.get_u1()? != 0)
    }

    pub fn get_u2(&mut self) -> Result<u16, IngestError> {
        let mut buf = [0u8; 2];
        self.src.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn get_i2(&mut self) -> Result<i16, IngestError> {
        let mut buf = [0u8; 2];
        self.src.read_exact(&mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    pub fn get_i4(&mut self) -> Result<i32, IngestError> {
        let mut buf = [0u8; 4];
        self.src.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    pub fn get_i8(&mut self) -> Result<i64, IngestError> {
        let mut buf = [0u8; 8];
        self.src.read_exact(&mut buf)?;
        Ok(i64::from_be_bytes(buf))
    }

    pub fn get_f4(&mut self) -> Result<f32, IngestError> {
        let mut buf = [0u8; 4];
        self.src.read_exact(&mut buf)?;
        Ok(f32::from_be_bytes(buf))
    }

    pub fn get_f8(&mut self) -> Result<f64, IngestError> {
        let mut buf = [0u8; 8];
        self.src.read_exact(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    /// Decode a declared length: `NA_LEN` means absent, anything else
    /// negative or above `max` is a protocol violation.
    fn get_len(&mut self, max: usize, what: &str) -> Result<Option<usize>, IngestError> {
        let n = self.get_i4()?;
        if n == na::NA_LEN {
            return Ok(None);
        }
        if n < 0 {
            return Err(IngestError::protocol(format!("negative {what} length: {n}")));
        }
        let n = n as usize;
        if n > max {
            return Err(IngestError::protocol(format!(
                "{what} length {n} exceeds limit {max}"
            )));
        }
        Ok(Some(n))
    }

    pub fn get_str_opt(&mut self) -> Result<Option<String>, IngestError> {
        let max = self.limits.max_string;
        let Some(n) = self.get_len(max, "string")? else {
            return Ok(None);
        };
        let mut buf = vec![0u8; n];
        self.src.read_exact(&mut buf)?;
        Ok(Some(String::from_utf8(buf)?))
    }

    pub fn get_str(&mut self) -> Result<String, IngestError> {
        self.get_str_opt()?
            .ok_or_else(|| IngestError::protocol("required string is absent"))
    }

    pub fn get_arr_u1(&mut self) -> Result<Option<Vec<u8>>, IngestError> {
        let max = self.limits.max_array;
        let Some(n) = self.get_len(max, "array")? else {
            return Ok(None);
        };
        let mut buf = vec![0u8; n];
        self.src.read_exact(&mut buf)?;
        Ok(Some(buf))
    }

    pub fn get_arr_i4(&mut self) -> Result<Option<Vec<i32>>, IngestError> {
        let max = self.limits.max_array;
        let Some(n) = self.get_len(max, "array")? else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.get_i4()?);
        }
        Ok(Some(out))
    }

    pub fn get_arr_i8(&mut self) -> Result<Option<Vec<i64>>, IngestError> {
        let max = self.limits.max_array;
        let Some(n) = self.get_len(max, "array")? else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.get_i8()?);
        }
        Ok(Some(out))
    }

    pub fn get_arr_f8(&mut self) -> Result<Option<Vec<f64>>, IngestError> {
        let max = self.limits.max_array;
        let Some(n) = self.get_len(max, "array")? else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.get_f8()?);
        }
        Ok(Some(out))
    }

    /// Array of required strings (an absent element is a violation).
    pub fn get_arr_str(&mut self) -> Result<Option<Vec<String>>, IngestError> {
        let max = self.limits.max_array;
        let Some(n) = self.get_len(max, "array")? else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.get_str()?);
        }
        Ok(Some(out))
    }

    /// Array of string arrays; inner arrays may be absent (used for
    /// per-column categorical domains).
    pub fn get_arr_arr_str(&mut self) -> Result<Option<Vec<Option<Vec<String>>>>, IngestError> {
        let max = self.limits.max_array;
        let Some(n) = self.get_len(max, "array")? else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.get_arr_str()?);
        }
        Ok(Some(out))
    }
}

// ═══════════════════════════════════════════════════════════════
//  ByteWriter
// ═══════════════════════════════════════════════════════════════

pub struct ByteWriter<W: Write> {
    dst: W,
}

impl<W: Write> ByteWriter<W> {
    pub fn new(dst: W) -> Self {
        Self { dst }
    }

    pub fn put_u1(&mut self, v: u8) -> Result<(), IngestError> {
        self.dst.write_all(&[v])?;
        Ok(())
    }

    pub fn put_bool(&mut self, v: bool) -> Result<(), IngestError> {
        self.put_u1(v as u8)
    }

    pub fn put_u2(&mut self, v: u16) -> Result<(), IngestError> {
        self.dst.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    pub fn put_i2(&mut self, v: i16) -> Result<(), IngestError> {
        self.dst.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    pub fn put_i4(&mut self, v: i32) -> Result<(), IngestError> {
        self.dst.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    pub fn put_i8(&mut self, v: i64) -> Result<(), IngestError> {
        self.dst.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    pub fn put_f4(&mut self, v: f32) -> Result<(), IngestError> {
        self.dst.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    pub fn put_f8(&mut self, v: f64) -> Result<(), IngestError> {
        self.dst.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    fn put_len(&mut self, n: usize) -> Result<(), IngestError> {
        let n = i32::try_from(n)
            .map_err(|_| IngestError::protocol(format!("length {n} does not fit the wire")))?;
        self.put_i4(n)
    }

    pub fn put_str(&mut self, v: Option<&str>) -> Result<(), IngestError> {
        match v {
            None => self.put_i4(na::NA_LEN),
            Some(s) => {
                self.put_len(s.len())?;
                self.dst.write_all(s.as_bytes())?;
                Ok(())
            }
        }
    }

    pub fn put_arr_u1(&mut self, v: Option<&[u8]>) -> Result<(), IngestError> {
        match v {
            None => self.put_i4(na::NA_LEN),
            Some(arr) => {
                self.put_len(arr.len())?;
                self.dst.write_all(arr)?;
                Ok(())
            }
        }
    }

    pub fn put_arr_i4(&mut self, v: Option<&[i32]>) -> Result<(), IngestError> {
        match v {
            None => self.put_i4(na::NA_LEN),
            Some(arr) => {
                self.put_len(arr.len())?;
                for &x in arr {
                    self.put_i4(x)?;
                }
                Ok(())
            }
        }
    }

    pub fn put_arr_i8(&mut self, v: Option<&[i64]>) -> Result<(), IngestError> {
        match v {
            None => self.put_i4(na::NA_LEN),
            Some(arr) => {
                self.put_len(arr.len())?;
                for &x in arr {
                    self.put_i8(x)?;
                }
                Ok(())
            }
        }
    }

    pub fn put_arr_f8(&mut self, v: Option<&[f64]>) -> Result<(), IngestError> {
        match v {
            None => self.put_i4(na::NA_LEN),
            Some(arr) => {
                self.put_len(arr.len())?;
                for &x in arr {
                    self.put_f8(x)?;
                }
                Ok(())
            }
        }
    }

    pub fn put_arr_str(&mut self, v: Option<&[String]>) -> Result<(), IngestError> {
        match v {
            None => self.put_i4(na::NA_LEN),
            Some(arr) => {
                self.put_len(arr.len())?;
                for s in arr {
                    self.put_str(Some(s))?;
                }
                Ok(())
            }
        }
    }

    pub fn put_arr_arr_str(&mut self, v: Option<&[Option<Vec<String>>]>) -> Result<(), IngestError> {
        match v {
            None => self.put_i4(na::NA_LEN),
            Some(arr) => {
                self.put_len(arr.len())?;
                for inner in arr {
                    self.put_arr_str(inner.as_deref())?;
                }
                Ok(())
            }
        }
    }

    pub fn flush(&mut self) -> Result<(), IngestError> {
        self.dst.flush()?;
        Ok(())
    }
}
