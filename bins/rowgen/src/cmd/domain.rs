use ingest::RowValue;
use weir_api::{FieldKind, StorageKind};

// ═══════════════════════════════════════════════════════════════
//  Demo schema
// ═══════════════════════════════════════════════════════════════

/// Logical schema of the generated stream: a timestamp, a sequence
/// number, a price, a categorical ticker and an embedding vector.
pub const FIELDS: [FieldKind; 5] = [
    FieldKind::Timestamp,
    FieldKind::Long,
    FieldKind::Double,
    FieldKind::Str,
    FieldKind::Vector,
];

pub const TICKERS: [&str; 6] = ["XAUUSD", "XAGUSD", "EURUSD", "GBPUSD", "USDJPY", "AUDUSD"];

/// One name per physical column (the vector expands to `width` columns).
pub fn column_names(width: usize) -> Vec<String> {
    let mut names = vec![
        "ts".to_string(),
        "seq".to_string(),
        "price".to_string(),
        "ticker".to_string(),
    ];
    for i in 0..width {
        names.push(format!("emb{i}"));
    }
    names
}

/// Final column storage types for FinalizeFrame.
pub fn storage_types(width: usize) -> Vec<u8> {
    let mut types = vec![
        StorageKind::Num.as_byte(),
        StorageKind::Num.as_byte(),
        StorageKind::Num.as_byte(),
        StorageKind::Str.as_byte(),
    ];
    types.extend(std::iter::repeat_n(StorageKind::Num.as_byte(), width));
    types
}

/// Categorical domains: only the ticker column carries one.
pub fn domains(width: usize) -> Vec<Option<Vec<String>>> {
    let mut out: Vec<Option<Vec<String>>> = vec![
        None,
        None,
        None,
        Some(TICKERS.iter().map(|t| t.to_string()).collect()),
    ];
    out.extend(std::iter::repeat_n(None, width));
    out
}

/// Synthesize one row. Price, ticker and vector cells go missing with
/// probability `na_rate`; timestamps and sequence numbers are always
/// present.
pub fn synth_row(rng: &mut Rng, seq: i64, na_rate: f64, width: usize) -> Vec<RowValue> {
    let ts = now_ms() + seq;
    let price = if rng.next_f64() < na_rate {
        f64::NAN
    } else {
        100.0 + rng.next_f64() * 10.0
    };
    let ticker = if rng.next_f64() < na_rate {
        None
    } else {
        Some(TICKERS[rng.next_intn(TICKERS.len())].to_string())
    };
    let vector = if rng.next_f64() < 0.5 {
        let len = rng.next_intn(width + 1);
        RowValue::Dense((0..len).map(|_| rng.next_f64()).collect())
    } else {
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for i in 0..width {
            if rng.next_f64() < 0.3 {
                indices.push(i as i32);
                values.push(rng.next_f64());
            }
        }
        RowValue::Sparse { indices, values }
    };
    vec![
        RowValue::Timestamp(ts),
        RowValue::Long(seq),
        RowValue::Double(price),
        RowValue::Str(ticker),
        vector,
    ]
}

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

// ═══════════════════════════════════════════════════════════════
//  RNG (xorshift64)
// ═══════════════════════════════════════════════════════════════

pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: i64) -> Self {
        let state = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
                | 1 // ensure non-zero
        } else {
            seed as u64
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Returns f64 in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / ((1u64 << 53) as f64)
    }

    pub fn next_intn(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_positionally_consistent() {
        let width = 8;
        let names = column_names(width);
        let types = storage_types(width);
        let doms = domains(width);
        assert_eq!(names.len(), 4 + width);
        assert_eq!(types.len(), names.len());
        assert_eq!(doms.len(), names.len());
        // Only ticker is categorical and string-typed.
        assert_eq!(types[3], StorageKind::Str.as_byte());
        assert!(doms[3].is_some());
        assert_eq!(doms.iter().filter(|d| d.is_some()).count(), 1);
    }

    #[test]
    fn rows_match_the_declared_fields() {
        let mut rng = Rng::new(42);
        for seq in 0..50 {
            let row = synth_row(&mut rng, seq, 0.2, 4);
            assert_eq!(row.len(), FIELDS.len());
            match &row[4] {
                RowValue::Dense(values) => assert!(values.len() <= 4),
                RowValue::Sparse { indices, values } => {
                    assert_eq!(indices.len(), values.len());
                    assert!(indices.windows(2).all(|w| w[0] < w[1]));
                    assert!(indices.iter().all(|&i| (0..4).contains(&i)));
                }
                other => panic!("unexpected vector value: {other:?}"),
            }
        }
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let mut a = Rng::new(7);
        let mut b = Rng::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }
}
