//! Sparse/dense vector expansion into fixed-width column runs.

use std::io::Read;

use frame_engine::ChunkWriter;
use weir_api::{na, Cell, IngestError};

use crate::wire::ByteReader;

/// Decode one vector field payload and append exactly one cell to each
/// writer in `dest` (one writer per physical column of the field).
pub fn read_vector<R: Read>(
    rd: &mut ByteReader<R>,
    dest: &mut [ChunkWriter],
) -> Result<(), IngestError> {
    let sparse = rd.get_bool()?;
    if sparse {
        let indices = rd
            .get_arr_i4()?
            .ok_or_else(|| IngestError::protocol("sparse vector indices are absent"))?;
        let values = rd
            .get_arr_f8()?
            .ok_or_else(|| IngestError::protocol("sparse vector values are absent"))?;
        expand_sparse(&indices, &values, dest)
    } else {
        let values = rd
            .get_arr_f8()?
            .ok_or_else(|| IngestError::protocol("dense vector values are absent"))?;
        expand_dense(&values, dest)
    }
}

/// Positions not named by `indices` receive a literal zero. Indices
/// must be strictly ascending within the declared width; the source
/// order is authoritative and is not sorted here.
pub fn expand_sparse(
    indices: &[i32],
    values: &[f64],
    dest: &mut [ChunkWriter],
) -> Result<(), IngestError> {
    let width = dest.len();
    if indices.len() != values.len() {
        return Err(IngestError::protocol(format!(
            "sparse vector has {} indices but {} values",
            indices.len(),
            values.len()
        )));
    }
    let mut cursor = 0usize;
    for (&index, &value) in indices.iter().zip(values) {
        if index < 0 || index as usize >= width {
            return Err(IngestError::protocol(format!(
                "sparse index {index} outside vector width {width}"
            )));
        }
        let index = index as usize;
        if index < cursor {
            return Err(IngestError::protocol(
                "sparse vector indices must be strictly ascending",
            ));
        }
        for col in &mut dest[cursor..index] {
            col.push(Cell::Real(0.0));
        }
        dest[index].push(na::real_cell(value));
        cursor = index + 1;
    }
    for col in &mut dest[cursor..width] {
        col.push(Cell::Real(0.0));
    }
    Ok(())
}

/// Positions past `values.len()` receive a literal zero. More values
/// than the declared width is rejected rather than clamped: clamping
/// would silently drop producer data.
pub fn expand_dense(values: &[f64], dest: &mut [ChunkWriter]) -> Result<(), IngestError> {
    let width = dest.len();
    if values.len() > width {
        return Err(IngestError::protocol(format!(
            "dense vector carries {} values for width {width}",
            values.len()
        )));
    }
    for (col, &value) in dest.iter_mut().zip(values) {
        col.push(na::real_cell(value));
    }
    for col in &mut dest[values.len()..] {
        col.push(Cell::Real(0.0));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_api::{ErrorKind, Limits, StorageKind};

    fn writers(width: usize) -> Vec<ChunkWriter> {
        (0..width).map(|_| ChunkWriter::new(StorageKind::Num)).collect()
    }

    fn cells(writers: &[ChunkWriter]) -> Vec<Cell> {
        writers.iter().map(|w| w.cells()[0].clone()).collect()
    }

    #[test]
    fn dense_fills_the_tail_with_zeros() {
        let mut dest = writers(4);
        expand_dense(&[1.0, 2.0], &mut dest).unwrap();
        assert_eq!(
            cells(&dest),
            vec![Cell::Real(1.0), Cell::Real(2.0), Cell::Real(0.0), Cell::Real(0.0)]
        );
    }

    #[test]
    fn sparse_scatters_between_zero_runs() {
        let mut dest = writers(5);
        expand_sparse(&[1, 3], &[5.0, 7.0], &mut dest).unwrap();
        assert_eq!(
            cells(&dest),
            vec![
                Cell::Real(0.0),
                Cell::Real(5.0),
                Cell::Real(0.0),
                Cell::Real(7.0),
                Cell::Real(0.0)
            ]
        );
    }

    #[test]
    fn sparse_with_no_pairs_is_all_zeros() {
        let mut dest = writers(3);
        expand_sparse(&[], &[], &mut dest).unwrap();
        assert_eq!(
            cells(&dest),
            vec![Cell::Real(0.0), Cell::Real(0.0), Cell::Real(0.0)]
        );
    }

    #[test]
    fn dense_longer_than_width_is_rejected() {
        let mut dest = writers(2);
        let err = expand_dense(&[1.0, 2.0, 3.0], &mut dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn sparse_index_out_of_range_is_rejected() {
        let mut dest = writers(3);
        assert!(expand_sparse(&[3], &[1.0], &mut dest).is_err());
        let mut dest = writers(3);
        assert!(expand_sparse(&[-1], &[1.0], &mut dest).is_err());
    }

    #[test]
    fn sparse_indices_must_ascend() {
        let mut dest = writers(4);
        assert!(expand_sparse(&[2, 1], &[1.0, 2.0], &mut dest).is_err());
        let mut dest = writers(4);
        assert!(expand_sparse(&[1, 1], &[1.0, 2.0], &mut dest).is_err());
    }

    #[test]
    fn sparse_count_mismatch_is_rejected() {
        let mut dest = writers(4);
        assert!(expand_sparse(&[0, 1], &[1.0], &mut dest).is_err());
    }

    #[test]
    fn nan_inside_a_vector_becomes_absent() {
        let mut dest = writers(2);
        expand_dense(&[f64::NAN, 1.0], &mut dest).unwrap();
        assert_eq!(cells(&dest), vec![Cell::Absent, Cell::Real(1.0)]);

        let mut dest = writers(2);
        expand_sparse(&[1], &[f64::NAN], &mut dest).unwrap();
        assert_eq!(cells(&dest), vec![Cell::Real(0.0), Cell::Absent]);
    }

    #[test]
    fn wire_payload_carries_the_sparse_flag() {
        use crate::wire::{ByteReader, ByteWriter};

        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        wr.put_bool(true).unwrap();
        wr.put_arr_i4(Some(&[0])).unwrap();
        wr.put_arr_f8(Some(&[9.0])).unwrap();
        wr.put_bool(false).unwrap();
        wr.put_arr_f8(Some(&[1.0, 2.0])).unwrap();

        let mut rd = ByteReader::new(std::io::Cursor::new(buf), Limits::default());
        let mut dest = writers(2);
        read_vector(&mut rd, &mut dest).unwrap();
        assert_eq!(cells(&dest), vec![Cell::Real(9.0), Cell::Real(0.0)]);

        let mut dest = writers(3);
        read_vector(&mut rd, &mut dest).unwrap();
        assert_eq!(
            cells(&dest),
            vec![Cell::Real(1.0), Cell::Real(2.0), Cell::Real(0.0)]
        );
    }

    #[test]
    fn absent_sparse_arrays_are_fatal() {
        use crate::wire::{ByteReader, ByteWriter};

        let mut buf = Vec::new();
        let mut wr = ByteWriter::new(&mut buf);
        wr.put_bool(true).unwrap();
        wr.put_arr_i4(None).unwrap();

        let mut rd = ByteReader::new(std::io::Cursor::new(buf), Limits::default());
        let err = read_vector(&mut rd, &mut writers(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
