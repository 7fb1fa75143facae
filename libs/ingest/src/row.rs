//! Per-row decode dispatch: one type-tagged read per logical field,
//! written into the physical columns the layout assigned to it.

use std::io::Read;

use frame_engine::ChunkWriter;
use weir_api::{na, Cell, FieldKind, IngestError};

use crate::layout::ChunkLayout;
use crate::vector;
use crate::wire::ByteReader;

/// Decode one row across all logical fields in declared order,
/// appending exactly `layout.widths[i]` cells per field.
pub fn decode_row<R: Read>(
    rd: &mut ByteReader<R>,
    fields: &[FieldKind],
    layout: &ChunkLayout,
    cols: &mut [ChunkWriter],
) -> Result<(), IngestError> {
    for (i, &kind) in fields.iter().enumerate() {
        let start = layout.starts[i];
        match kind {
            // Bool is stored as a number, same as byte.
            FieldKind::Bool | FieldKind::Byte => cols[start].push(na::byte_cell(rd.get_u1()?)),
            // Char carries no sentinel; stored as given.
            FieldKind::Char => cols[start].push(Cell::Int(rd.get_u2()? as i64)),
            FieldKind::Short => cols[start].push(na::short_cell(rd.get_i2()?)),
            FieldKind::Int => cols[start].push(na::int_cell(rd.get_i4()?)),
            // Timestamp is stored as a long.
            FieldKind::Timestamp | FieldKind::Long => cols[start].push(na::long_cell(rd.get_i8()?)),
            FieldKind::Float => cols[start].push(na::float_cell(rd.get_f4()?)),
            FieldKind::Double => cols[start].push(na::real_cell(rd.get_f8()?)),
            FieldKind::Str => cols[start].push(na::str_cell(rd.get_str_opt()?)),
            FieldKind::Vector => {
                let width = layout.widths[i];
                vector::read_vector(rd, &mut cols[start..start + width])?;
            }
        }
    }
    Ok(())
}
