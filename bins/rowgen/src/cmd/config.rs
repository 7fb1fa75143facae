use clap::Args;

use super::error::RowGenError;

#[derive(Args, Clone, Debug)]
pub struct GenArgs {
    /// Server address
    #[arg(long, default_value = "127.0.0.1:54321", env = "WEIR_ADDR")]
    pub addr: String,

    /// Frame key to assemble
    #[arg(long, default_value = "rowgen")]
    pub frame: String,

    /// Number of chunks to write
    #[arg(long, default_value_t = 4)]
    pub chunks: u32,

    /// Rows per chunk
    #[arg(long, default_value_t = 1000)]
    pub rows: u32,

    /// Physical width of the embedding vector field
    #[arg(long, default_value_t = 8)]
    pub vector_width: u32,

    /// Probability of a missing value per nullable field
    #[arg(long, default_value_t = 0.05)]
    pub na_rate: f64,

    /// Target send rate, chunks per second (0 = unthrottled)
    #[arg(long, default_value_t = 0.0)]
    pub rate: f64,

    /// RNG seed (0 = time-based)
    #[arg(long, default_value_t = 0)]
    pub seed: i64,
}

/// Validated args.
#[derive(Debug, Clone)]
pub struct Effective {
    pub addr: String,
    pub frame: String,
    pub chunks: u32,
    pub rows: u32,
    pub vector_width: usize,
    pub na_rate: f64,
    pub rate: f64,
    pub seed: i64,
}

impl Effective {
    pub fn new(args: &GenArgs) -> Result<Self, RowGenError> {
        if args.frame.is_empty() {
            return Err(RowGenError::Config("--frame must not be empty".into()));
        }
        if args.chunks == 0 {
            return Err(RowGenError::Config("--chunks must be at least 1".into()));
        }
        if args.vector_width == 0 {
            return Err(RowGenError::Config("--vector-width must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&args.na_rate) {
            return Err(RowGenError::Config(format!(
                "--na-rate must be within [0, 1], got {}",
                args.na_rate
            )));
        }
        Ok(Self {
            addr: args.addr.clone(),
            frame: args.frame.clone(),
            chunks: args.chunks,
            rows: args.rows,
            vector_width: args.vector_width as usize,
            na_rate: args.na_rate,
            rate: args.rate,
            seed: args.seed,
        })
    }
}
