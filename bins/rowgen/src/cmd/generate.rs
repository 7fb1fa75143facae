use std::net::TcpStream;

use ingest::{FrameSink, RowValue};

use super::config::Effective;
use super::domain::{column_names, domains, storage_types, synth_row, Rng, FIELDS};
use super::error::RowGenError;

pub async fn run(args: &Effective) -> Result<(), RowGenError> {
    let mut rng = Rng::new(args.seed);

    let stream = TcpStream::connect(&args.addr)
        .map_err(|e| RowGenError::Connect { addr: args.addr.clone(), source: e })?;
    tracing::info!(addr = %args.addr, "connected");
    let mut sink = FrameSink::new(stream);

    let names = column_names(args.vector_width);
    sink.begin_frame(&args.frame, &names)?;
    tracing::info!(frame = %args.frame, columns = names.len(), "frame registered");

    let widths = [args.vector_width as i32];
    let start = std::time::Instant::now();
    let mut seq: i64 = 0;
    let mut sent_chunks: u32 = 0;

    if args.rate <= 0.0 {
        // Batch send
        for chunk_id in 0..args.chunks {
            send_chunk(&mut sink, args, &mut rng, &widths, chunk_id, &mut seq)?;
            sent_chunks += 1;
            progress(sent_chunks, args.chunks, seq, &start);
        }
    } else {
        // Rate-limited send
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs_f64(1.0 / args.rate));
        for chunk_id in 0..args.chunks {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    eprintln!();
                    tracing::warn!(
                        chunks = sent_chunks,
                        rows = seq,
                        "interrupted, frame left unfinalized"
                    );
                    return Ok(());
                }
                _ = interval.tick() => {
                    send_chunk(&mut sink, args, &mut rng, &widths, chunk_id, &mut seq)?;
                    sent_chunks += 1;
                    progress(sent_chunks, args.chunks, seq, &start);
                }
            }
        }
    }
    eprintln!();

    sink.finalize_frame(
        &args.frame,
        &vec![args.rows as i64; args.chunks as usize],
        &storage_types(args.vector_width),
        &domains(args.vector_width),
    )?;

    let elapsed = start.elapsed();
    tracing::info!(
        frame = %args.frame,
        chunks = sent_chunks,
        rows = seq,
        elapsed_s = format_args!("{:.1}", elapsed.as_secs_f64()),
        rate = format_args!("{:.0} rows/s", seq as f64 / elapsed.as_secs_f64().max(1e-9)),
        "frame complete"
    );
    Ok(())
}

fn send_chunk(
    sink: &mut FrameSink<TcpStream>,
    args: &Effective,
    rng: &mut Rng,
    widths: &[i32],
    chunk_id: u32,
    seq: &mut i64,
) -> Result<(), RowGenError> {
    let mut rows: Vec<Vec<RowValue>> = Vec::with_capacity(args.rows as usize);
    for _ in 0..args.rows {
        rows.push(synth_row(rng, *seq, args.na_rate, args.vector_width));
        *seq += 1;
    }
    sink.write_chunk(&args.frame, &FIELDS, Some(widths), chunk_id as i32, &rows)?;
    Ok(())
}

fn progress(sent: u32, total: u32, rows: i64, start: &std::time::Instant) {
    let elapsed = start.elapsed().as_secs_f64().max(1e-9);
    eprint!(
        "\r  {sent}/{total} chunks ({:.0} rows/s)",
        rows as f64 / elapsed
    );
}
