pub mod error;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use weir_api::{Cell, StorageKind};

pub use error::FrameError;

// ═══════════════════════════════════════════════════════════════
//  ChunkWriter / Chunk
// ═══════════════════════════════════════════════════════════════

/// Append buffer for one physical column of one chunk.
///
/// Writers are private to the session that acquired them; nothing is
/// visible in the frame until the whole set is committed.
pub struct ChunkWriter {
    kind: StorageKind,
    cells: Vec<Cell>,
}

impl ChunkWriter {
    pub fn new(kind: StorageKind) -> Self {
        Self { kind, cells: Vec::new() }
    }

    pub fn with_capacity(kind: StorageKind, rows: usize) -> Self {
        Self { kind, cells: Vec::with_capacity(rows) }
    }

    pub fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    fn seal(self) -> Chunk {
        Chunk { kind: self.kind, cells: self.cells }
    }
}

/// Sealed, immutable column chunk.
#[derive(Debug, Clone)]
pub struct Chunk {
    kind: StorageKind,
    cells: Vec<Cell>,
}

impl Chunk {
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Frame
// ═══════════════════════════════════════════════════════════════

/// Final column metadata recorded by FinalizeFrame. The storage type
/// bytes and categorical domains are opaque to the store; the query
/// side interprets them.
#[derive(Debug, Clone)]
pub struct FrameMeta {
    pub rows_per_chunk: Vec<i64>,
    pub col_types: Vec<u8>,
    pub domains: Vec<Option<Vec<String>>>,
}

#[derive(Debug, Clone)]
pub struct FrameSummary {
    pub columns: usize,
    pub chunks: usize,
    pub rows: u64,
    pub finalized: bool,
}

struct FrameState {
    /// chunk id → one sealed chunk per physical column.
    committed: HashMap<i32, Vec<Chunk>>,
    /// chunk ids with a writer set in flight. Serializes concurrent
    /// writers targeting the same chunk id.
    reserved: HashSet<i32>,
    finalized: Option<FrameMeta>,
}

/// One distributed table being assembled: a fixed set of physical
/// columns receiving chunks under client-assigned chunk ids.
pub struct Frame {
    pub name: String,
    columns: Vec<String>,
    state: Mutex<FrameState>,
}

impl Frame {
    fn new(name: &str, columns: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            state: Mutex::new(FrameState {
                committed: HashMap::new(),
                reserved: HashSet::new(),
                finalized: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrameState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Cloned view of one committed chunk (one entry per physical column).
    pub fn chunk(&self, chunk_id: i32) -> Option<Vec<Chunk>> {
        self.lock().committed.get(&chunk_id).cloned()
    }

    pub fn is_finalized(&self) -> bool {
        self.lock().finalized.is_some()
    }

    pub fn meta(&self) -> Option<FrameMeta> {
        self.lock().finalized.clone()
    }

    pub fn summary(&self) -> FrameSummary {
        let state = self.lock();
        let rows = match &state.finalized {
            Some(meta) => meta.rows_per_chunk.iter().map(|&r| r.max(0) as u64).sum(),
            None => state
                .committed
                .values()
                .map(|cols| cols.first().map_or(0, |c| c.len() as u64))
                .sum(),
        };
        FrameSummary {
            columns: self.columns.len(),
            chunks: state.committed.len(),
            rows,
            finalized: state.finalized.is_some(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  FrameRegistry
// ═══════════════════════════════════════════════════════════════

/// Registry of all frames known to this node. Shared across sessions;
/// the narrow register / create_writers / commit / finalize surface is
/// the only way decoding touches storage.
pub struct FrameRegistry {
    frames: RwLock<HashMap<String, Arc<Frame>>>,
}

impl Default for FrameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self { frames: RwLock::new(HashMap::new()) }
    }

    fn lookup(&self, key: &str) -> Result<Arc<Frame>, FrameError> {
        self.frames
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
            .ok_or_else(|| FrameError::NotFound(key.to_string()))
    }

    /// Register a new frame shell. Re-registering an existing key drops
    /// the previous shell so a client retrying after a torn-down session
    /// can start over.
    pub fn register(&self, key: &str, columns: Vec<String>) {
        let count = columns.len();
        let frame = Arc::new(Frame::new(key, columns));
        let previous = self
            .frames
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), frame);
        if previous.is_some() {
            tracing::warn!(frame = %key, columns = count, "re-registered frame, dropped previous shell");
        } else {
            tracing::info!(frame = %key, columns = count, "registered frame");
        }
    }

    /// Acquire append writers for one chunk, one per physical column.
    /// Reserves the chunk id until `commit` or `abort`.
    pub fn create_writers(
        &self,
        key: &str,
        physical: &[StorageKind],
        chunk_id: i32,
        rows: usize,
    ) -> Result<Vec<ChunkWriter>, FrameError> {
        let frame = self.lookup(key)?;
        let mut state = frame.lock();
        if state.finalized.is_some() {
            return Err(FrameError::Finalized(key.to_string()));
        }
        if physical.len() != frame.columns.len() {
            return Err(FrameError::ColumnCount {
                key: key.to_string(),
                expected: frame.columns.len(),
                got: physical.len(),
            });
        }
        if state.committed.contains_key(&chunk_id) {
            return Err(FrameError::ChunkExists { key: key.to_string(), chunk_id });
        }
        if !state.reserved.insert(chunk_id) {
            return Err(FrameError::ChunkBusy { key: key.to_string(), chunk_id });
        }
        Ok(physical
            .iter()
            .map(|&kind| ChunkWriter::with_capacity(kind, rows))
            .collect())
    }

    /// Seal and publish one chunk atomically. The reservation is released
    /// whether or not validation passes, so a failed chunk id can be
    /// retried on a fresh session.
    pub fn commit(
        &self,
        key: &str,
        chunk_id: i32,
        writers: Vec<ChunkWriter>,
        expected_rows: usize,
    ) -> Result<(), FrameError> {
        let frame = self.lookup(key)?;
        let mut state = frame.lock();
        if !state.reserved.remove(&chunk_id) {
            return Err(FrameError::NotReserved { key: key.to_string(), chunk_id });
        }
        for (column, writer) in writers.iter().enumerate() {
            if writer.len() != expected_rows {
                return Err(FrameError::RowCount {
                    key: key.to_string(),
                    chunk_id,
                    column,
                    got: writer.len(),
                    expected: expected_rows,
                });
            }
        }
        let columns = writers.len();
        let sealed = writers.into_iter().map(ChunkWriter::seal).collect();
        state.committed.insert(chunk_id, sealed);
        tracing::debug!(frame = %key, chunk = chunk_id, rows = expected_rows, columns, "chunk committed");
        Ok(())
    }

    /// Release a chunk reservation after a mid-decode failure. Nothing of
    /// the aborted chunk is visible in the frame.
    pub fn abort(&self, key: &str, chunk_id: i32) {
        if let Ok(frame) = self.lookup(key) {
            if frame.lock().reserved.remove(&chunk_id) {
                tracing::debug!(frame = %key, chunk = chunk_id, "chunk reservation aborted");
            }
        }
    }

    /// Seal the frame. Later writer acquisition is rejected.
    pub fn finalize(&self, key: &str, meta: FrameMeta) -> Result<FrameSummary, FrameError> {
        let frame = self.lookup(key)?;
        let mut state = frame.lock();
        if state.finalized.is_some() {
            return Err(FrameError::Finalized(key.to_string()));
        }
        if meta.col_types.len() != frame.columns.len() {
            return Err(FrameError::ColumnCount {
                key: key.to_string(),
                expected: frame.columns.len(),
                got: meta.col_types.len(),
            });
        }
        if meta.domains.len() != frame.columns.len() {
            return Err(FrameError::ColumnCount {
                key: key.to_string(),
                expected: frame.columns.len(),
                got: meta.domains.len(),
            });
        }
        if meta.rows_per_chunk.len() != state.committed.len() {
            tracing::warn!(
                frame = %key,
                declared = meta.rows_per_chunk.len(),
                committed = state.committed.len(),
                "finalize chunk count differs from committed chunks"
            );
        }
        let rows: u64 = meta.rows_per_chunk.iter().map(|&r| r.max(0) as u64).sum();
        let chunks = state.committed.len();
        state.finalized = Some(meta);
        drop(state);
        Ok(FrameSummary {
            columns: frame.columns.len(),
            chunks,
            rows,
            finalized: true,
        })
    }

    pub fn get(&self, key: &str) -> Option<Arc<Frame>> {
        self.frames
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}
