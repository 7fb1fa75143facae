//! Client side of the session protocol: command encoders and a
//! synchronous sink that drives a connection command-by-command,
//! waiting for each acknowledgment byte.

use std::io::{Read, Write};

use weir_api::{FieldKind, IngestError, RequestKind};

use crate::wire::ByteWriter;

/// One client-side field value for a single row. Must match the
/// declared [`FieldKind`] positionally.
#[derive(Debug, Clone)]
pub enum RowValue {
    Bool(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Timestamp(i64),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Option<String>),
    Dense(Vec<f64>),
    Sparse { indices: Vec<i32>, values: Vec<f64> },
}

pub fn encode_begin_frame<W: Write>(
    wr: &mut ByteWriter<W>,
    key: &str,
    columns: &[String],
) -> Result<(), IngestError> {
    wr.put_u1(RequestKind::BeginFrame.as_byte())?;
    wr.put_str(Some(key))?;
    wr.put_arr_str(Some(columns))
}

pub fn encode_write_chunk<W: Write>(
    wr: &mut ByteWriter<W>,
    key: &str,
    fields: &[FieldKind],
    vec_widths: Option<&[i32]>,
    chunk_id: i32,
    rows: &[Vec<RowValue>],
) -> Result<(), IngestError> {
    wr.put_u1(RequestKind::WriteChunk.as_byte())?;
    wr.put_str(Some(key))?;
    let tags: Vec<u8> = fields.iter().map(|k| k.as_byte()).collect();
    wr.put_arr_u1(Some(&tags))?;
    wr.put_arr_i4(vec_widths)?;
    wr.put_i4(rows.len() as i32)?;
    wr.put_i4(chunk_id)?;
    for row in rows {
        if row.len() != fields.len() {
            return Err(IngestError::protocol(format!(
                "row carries {} values for {} declared fields",
                row.len(),
                fields.len()
            )));
        }
        for (kind, value) in fields.iter().zip(row) {
            put_value(wr, *kind, value)?;
        }
    }
    Ok(())
}

pub fn encode_finalize_frame<W: Write>(
    wr: &mut ByteWriter<W>,
    key: &str,
    rows_per_chunk: &[i64],
    col_types: &[u8],
    domains: &[Option<Vec<String>>],
) -> Result<(), IngestError> {
    wr.put_u1(RequestKind::FinalizeFrame.as_byte())?;
    wr.put_str(Some(key))?;
    wr.put_arr_i8(Some(rows_per_chunk))?;
    wr.put_arr_u1(Some(col_types))?;
    wr.put_arr_arr_str(Some(domains))
}

fn put_value<W: Write>(
    wr: &mut ByteWriter<W>,
    kind: FieldKind,
    value: &RowValue,
) -> Result<(), IngestError> {
    match (kind, value) {
        (FieldKind::Bool, RowValue::Bool(v)) => wr.put_u1(*v as u8),
        (FieldKind::Byte, RowValue::Byte(v)) => wr.put_u1(*v as u8),
        (FieldKind::Char, RowValue::Char(v)) => wr.put_u2(*v),
        (FieldKind::Short, RowValue::Short(v)) => wr.put_i2(*v),
        (FieldKind::Int, RowValue::Int(v)) => wr.put_i4(*v),
        (FieldKind::Timestamp, RowValue::Timestamp(v)) => wr.put_i8(*v),
        (FieldKind::Long, RowValue::Long(v)) => wr.put_i8(*v),
        (FieldKind::Float, RowValue::Float(v)) => wr.put_f4(*v),
        (FieldKind::Double, RowValue::Double(v)) => wr.put_f8(*v),
        (FieldKind::Str, RowValue::Str(v)) => wr.put_str(v.as_deref()),
        (FieldKind::Vector, RowValue::Dense(values)) => {
            wr.put_bool(false)?;
            wr.put_arr_f8(Some(values))
        }
        (FieldKind::Vector, RowValue::Sparse { indices, values }) => {
            wr.put_bool(true)?;
            wr.put_arr_i4(Some(indices))?;
            wr.put_arr_f8(Some(values))
        }
        (kind, value) => Err(IngestError::protocol(format!(
            "row value {value:?} does not match declared {kind} field"
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════
//  FrameSink
// ═══════════════════════════════════════════════════════════════

/// Synchronous frame producer over one connection. Commands are
/// buffered, written whole, then the one-byte acknowledgment is
/// awaited before the next command may start.
pub struct FrameSink<S: Read + Write> {
    stream: S,
    buf: Vec<u8>,
}

impl<S: Read + Write> FrameSink<S> {
    pub fn new(stream: S) -> Self {
        Self { stream, buf: Vec::with_capacity(8192) }
    }

    pub fn begin_frame(&mut self, key: &str, columns: &[String]) -> Result<(), IngestError> {
        self.buf.clear();
        encode_begin_frame(&mut ByteWriter::new(&mut self.buf), key, columns)?;
        self.send_and_ack(RequestKind::BeginFrame)
    }

    pub fn write_chunk(
        &mut self,
        key: &str,
        fields: &[FieldKind],
        vec_widths: Option<&[i32]>,
        chunk_id: i32,
        rows: &[Vec<RowValue>],
    ) -> Result<(), IngestError> {
        self.buf.clear();
        encode_write_chunk(
            &mut ByteWriter::new(&mut self.buf),
            key,
            fields,
            vec_widths,
            chunk_id,
            rows,
        )?;
        self.send_and_ack(RequestKind::WriteChunk)
    }

    pub fn finalize_frame(
        &mut self,
        key: &str,
        rows_per_chunk: &[i64],
        col_types: &[u8],
        domains: &[Option<Vec<String>>],
    ) -> Result<(), IngestError> {
        self.buf.clear();
        encode_finalize_frame(
            &mut ByteWriter::new(&mut self.buf),
            key,
            rows_per_chunk,
            col_types,
            domains,
        )?;
        self.send_and_ack(RequestKind::FinalizeFrame)
    }

    fn send_and_ack(&mut self, kind: RequestKind) -> Result<(), IngestError> {
        self.stream.write_all(&self.buf)?;
        self.stream.flush()?;
        let mut ack = [0u8; 1];
        self.stream.read_exact(&mut ack)?;
        if ack[0] != kind.as_byte() {
            return Err(IngestError::protocol(format!(
                "unexpected acknowledgment {} for {kind}",
                ack[0]
            )));
        }
        Ok(())
    }
}
