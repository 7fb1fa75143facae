pub mod client;
pub mod layout;
pub mod row;
pub mod session;
pub mod vector;
pub mod wire;

pub use client::{FrameSink, RowValue};
pub use layout::ChunkLayout;
pub use session::run_session;
