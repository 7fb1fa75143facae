//! The three-command session protocol. One session owns one
//! connection and runs strictly sequentially: read a command code,
//! decode the payload, acknowledge with the same byte, repeat until
//! the peer closes the stream or a fatal error tears the session down.

use std::io::{Read, Write};

use frame_engine::{FrameError, FrameMeta, FrameRegistry};
use weir_api::{FieldKind, IngestError, Limits, RequestKind};

use crate::layout;
use crate::row;
use crate::wire::{ByteReader, ByteWriter};

/// Run one decoding session until clean EOF or a fatal error.
///
/// Errors propagate to the caller for logging; the in-flight command is
/// never acknowledged, which is how the peer learns the write failed.
pub fn run_session<R: Read, W: Write>(
    peer: &str,
    reader: R,
    writer: W,
    registry: &FrameRegistry,
    limits: &Limits,
) -> Result<(), IngestError> {
    let mut rd = ByteReader::new(reader, limits.clone());
    let mut wr = ByteWriter::new(writer);

    loop {
        let Some(code) = rd.try_get_u1()? else {
            tracing::debug!(%peer, "peer closed the session");
            return Ok(());
        };
        let kind = RequestKind::from_byte(code)?;
        tracing::trace!(%peer, command = %kind, "command received");
        match kind {
            RequestKind::BeginFrame => begin_frame(&mut rd, registry)?,
            RequestKind::WriteChunk => write_chunk(&mut rd, registry, peer)?,
            RequestKind::FinalizeFrame => finalize_frame(&mut rd, registry)?,
        }
        wr.put_u1(kind.as_byte())?;
        wr.flush()?;
    }
}

fn begin_frame<R: Read>(
    rd: &mut ByteReader<R>,
    registry: &FrameRegistry,
) -> Result<(), IngestError> {
    let key = rd.get_str()?;
    let names = rd
        .get_arr_str()?
        .ok_or_else(|| IngestError::protocol("column names are absent"))?;
    registry.register(&key, names);
    Ok(())
}

fn write_chunk<R: Read>(
    rd: &mut ByteReader<R>,
    registry: &FrameRegistry,
    peer: &str,
) -> Result<(), IngestError> {
    let key = rd.get_str()?;

    let tags = rd
        .get_arr_u1()?
        .ok_or_else(|| IngestError::protocol("expected types are absent"))?;
    if tags.is_empty() {
        return Err(IngestError::protocol("expected types are empty"));
    }
    let fields = tags
        .iter()
        .map(|&b| FieldKind::from_byte(b))
        .collect::<Result<Vec<_>, _>>()?;

    // An absent width list leaves every vector field at width 1.
    let raw_widths = rd.get_arr_i4()?.unwrap_or_default();
    let mut vec_widths = Vec::with_capacity(raw_widths.len());
    for w in raw_widths {
        if w < 1 {
            return Err(IngestError::protocol(format!(
                "vector width must be positive, got {w}"
            )));
        }
        vec_widths.push(w as usize);
    }

    let rows = rd.get_i4()?;
    if rows < 0 {
        return Err(IngestError::protocol(format!("negative row count: {rows}")));
    }
    let rows = rows as usize;
    let chunk_id = rd.get_i4()?;

    let plan = layout::plan(&fields, &vec_widths);
    let mut cols = registry
        .create_writers(&key, &plan.physical, chunk_id, rows)
        .map_err(FrameError::into_ingest_error)?;

    for _ in 0..rows {
        if let Err(e) = row::decode_row(rd, &fields, &plan, &mut cols) {
            registry.abort(&key, chunk_id);
            return Err(e);
        }
    }
    registry
        .commit(&key, chunk_id, cols, rows)
        .map_err(FrameError::into_ingest_error)?;
    tracing::debug!(%peer, frame = %key, chunk = chunk_id, rows, columns = plan.total(), "chunk written");
    Ok(())
}

fn finalize_frame<R: Read>(
    rd: &mut ByteReader<R>,
    registry: &FrameRegistry,
) -> Result<(), IngestError> {
    let key = rd.get_str()?;
    let rows_per_chunk = rd
        .get_arr_i8()?
        .ok_or_else(|| IngestError::protocol("per-chunk row counts are absent"))?;
    let col_types = rd
        .get_arr_u1()?
        .ok_or_else(|| IngestError::protocol("column storage types are absent"))?;
    let domains = rd
        .get_arr_arr_str()?
        .ok_or_else(|| IngestError::protocol("column domains are absent"))?;

    let summary = registry
        .finalize(&key, FrameMeta { rows_per_chunk, col_types, domains })
        .map_err(FrameError::into_ingest_error)?;
    tracing::info!(frame = %key, chunks = summary.chunks, rows = summary.rows, "frame finalized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        encode_begin_frame, encode_finalize_frame, encode_write_chunk, RowValue,
    };
    use crate::wire::ByteWriter;
    use std::io::Cursor;
    use weir_api::{na, Cell, ErrorKind};

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    fn run(buf: Vec<u8>, registry: &FrameRegistry) -> (Result<(), IngestError>, Vec<u8>) {
        let mut acks = Vec::new();
        let result = run_session(
            "test",
            Cursor::new(buf),
            &mut acks,
            registry,
            &Limits::default(),
        );
        (result, acks)
    }

    #[test]
    fn full_exchange_builds_and_finalizes_a_frame() {
        // [int, vector(3)], two rows mixing a dense vector, a sparse
        // vector and an int sentinel.
        let fields = [FieldKind::Int, FieldKind::Vector];
        let rows = vec![
            vec![RowValue::Int(42), RowValue::Dense(vec![1.0, 2.0, 3.0])],
            vec![
                RowValue::Int(na::NA_INT),
                RowValue::Sparse { indices: vec![0], values: vec![9.0] },
            ],
        ];

        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        encode_begin_frame(&mut wr, "scores", &names("c", 4)).unwrap();
        encode_write_chunk(&mut wr, "scores", &fields, Some(&[3]), 0, &rows).unwrap();
        encode_finalize_frame(
            &mut wr,
            "scores",
            &[2],
            &[0, 0, 0, 0],
            &[None, None, None, None],
        )
        .unwrap();

        let registry = FrameRegistry::new();
        let (result, acks) = run(buf, &registry);
        result.unwrap();
        assert_eq!(acks, vec![1, 2, 3]);

        let frame = registry.get("scores").unwrap();
        assert!(frame.is_finalized());
        let chunk = frame.chunk(0).unwrap();
        assert_eq!(chunk.len(), 4);
        assert_eq!(chunk[0].cells(), &[Cell::Int(42), Cell::Absent]);
        assert_eq!(chunk[1].cells(), &[Cell::Real(1.0), Cell::Real(9.0)]);
        assert_eq!(chunk[2].cells(), &[Cell::Real(2.0), Cell::Real(0.0)]);
        assert_eq!(chunk[3].cells(), &[Cell::Real(3.0), Cell::Real(0.0)]);
    }

    #[test]
    fn zero_rows_still_commits_sealed_columns() {
        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        encode_begin_frame(&mut wr, "empty", &names("c", 1)).unwrap();
        encode_write_chunk(&mut wr, "empty", &[FieldKind::Double], None, 5, &[]).unwrap();

        let registry = FrameRegistry::new();
        let (result, acks) = run(buf, &registry);
        result.unwrap();
        assert_eq!(acks, vec![1, 2]);

        let chunk = registry.get("empty").unwrap().chunk(5).unwrap();
        assert_eq!(chunk.len(), 1);
        assert!(chunk[0].is_empty());
    }

    #[test]
    fn empty_expected_types_fail_before_any_row() {
        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        encode_begin_frame(&mut wr, "f", &names("c", 1)).unwrap();
        // Hand-rolled WriteChunk with an empty type list.
        wr.put_u1(RequestKind::WriteChunk.as_byte()).unwrap();
        wr.put_str(Some("f")).unwrap();
        wr.put_arr_u1(Some(&[])).unwrap();

        let registry = FrameRegistry::new();
        let (result, acks) = run(buf, &registry);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        // Only the BeginFrame was acknowledged.
        assert_eq!(acks, vec![1]);
    }

    #[test]
    fn absent_expected_types_fail() {
        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        encode_begin_frame(&mut wr, "f", &names("c", 1)).unwrap();
        wr.put_u1(RequestKind::WriteChunk.as_byte()).unwrap();
        wr.put_str(Some("f")).unwrap();
        wr.put_arr_u1(None).unwrap();

        let registry = FrameRegistry::new();
        let (result, _) = run(buf, &registry);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Protocol);
    }

    #[test]
    fn unknown_field_tag_is_fatal() {
        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        encode_begin_frame(&mut wr, "f", &names("c", 1)).unwrap();
        wr.put_u1(RequestKind::WriteChunk.as_byte()).unwrap();
        wr.put_str(Some("f")).unwrap();
        wr.put_arr_u1(Some(&[99])).unwrap();

        let registry = FrameRegistry::new();
        let (result, _) = run(buf, &registry);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Protocol);
    }

    #[test]
    fn unknown_command_code_is_fatal() {
        let registry = FrameRegistry::new();
        let (result, acks) = run(vec![0xAB], &registry);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Protocol);
        assert!(acks.is_empty());
    }

    #[test]
    fn chunk_id_conflict_is_a_storage_error() {
        let fields = [FieldKind::Int];
        let row = vec![vec![RowValue::Int(1)]];
        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        encode_begin_frame(&mut wr, "f", &names("c", 1)).unwrap();
        encode_write_chunk(&mut wr, "f", &fields, None, 0, &row).unwrap();
        encode_write_chunk(&mut wr, "f", &fields, None, 0, &row).unwrap();

        let registry = FrameRegistry::new();
        let (result, acks) = run(buf, &registry);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Storage);
        assert_eq!(acks, vec![1, 2]);
    }

    #[test]
    fn write_to_unknown_frame_is_a_storage_error() {
        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        encode_write_chunk(&mut wr, "ghost", &[FieldKind::Int], None, 0, &[]).unwrap();

        let registry = FrameRegistry::new();
        let (result, _) = run(buf, &registry);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Storage);
    }

    #[test]
    fn failed_chunk_is_aborted_and_retryable() {
        // A dense vector wider than the declared width kills the first
        // attempt mid-row; a fresh session may retry the same chunk id.
        let fields = [FieldKind::Vector];
        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        encode_begin_frame(&mut wr, "f", &names("c", 2)).unwrap();
        encode_write_chunk(
            &mut wr,
            "f",
            &fields,
            Some(&[2]),
            0,
            &[vec![RowValue::Dense(vec![1.0, 2.0, 3.0])]],
        )
        .unwrap();

        let registry = FrameRegistry::new();
        let (result, _) = run(buf, &registry);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Protocol);
        assert!(registry.get("f").unwrap().chunk(0).is_none());

        let mut retry = Vec::new();
        let mut wr = ByteWriter::new(&mut retry);
        encode_write_chunk(
            &mut wr,
            "f",
            &fields,
            Some(&[2]),
            0,
            &[vec![RowValue::Dense(vec![1.0, 2.0])]],
        )
        .unwrap();
        let (result, acks) = run(retry, &registry);
        result.unwrap();
        assert_eq!(acks, vec![2]);
        assert_eq!(
            registry.get("f").unwrap().chunk(0).unwrap()[0].cells(),
            &[Cell::Real(1.0)]
        );
    }

    #[test]
    fn negative_vector_width_is_rejected() {
        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        encode_begin_frame(&mut wr, "f", &names("c", 1)).unwrap();
        wr.put_u1(RequestKind::WriteChunk.as_byte()).unwrap();
        wr.put_str(Some("f")).unwrap();
        wr.put_arr_u1(Some(&[FieldKind::Vector.as_byte()])).unwrap();
        wr.put_arr_i4(Some(&[-3])).unwrap();

        let registry = FrameRegistry::new();
        let (result, _) = run(buf, &registry);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Protocol);
    }

    #[test]
    fn multiple_chunks_accumulate_under_one_frame() {
        let fields = [FieldKind::Long];
        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        encode_begin_frame(&mut wr, "f", &names("c", 1)).unwrap();
        for chunk_id in 0..3 {
            let rows = vec![vec![RowValue::Long(chunk_id as i64)]];
            encode_write_chunk(&mut wr, "f", &fields, None, chunk_id, &rows).unwrap();
        }
        encode_finalize_frame(&mut wr, "f", &[1, 1, 1], &[0], &[None]).unwrap();

        let registry = FrameRegistry::new();
        let (result, acks) = run(buf, &registry);
        result.unwrap();
        assert_eq!(acks, vec![1, 2, 2, 2, 3]);

        let frame = registry.get("f").unwrap();
        let summary = frame.summary();
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.rows, 3);
        assert!(summary.finalized);
        assert_eq!(frame.chunk(2).unwrap()[0].cells(), &[Cell::Int(2)]);
    }

    #[test]
    fn clean_eof_ends_the_session_quietly() {
        let registry = FrameRegistry::new();
        let (result, acks) = run(Vec::new(), &registry);
        result.unwrap();
        assert!(acks.is_empty());
    }
}
