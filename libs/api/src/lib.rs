pub mod error;
pub mod na;
pub mod types;
pub mod value;

pub use error::{ErrorKind, IngestError};
pub use types::{FieldKind, Limits, RequestKind, StorageKind};
pub use value::Cell;
