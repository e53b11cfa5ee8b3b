pub mod config;
pub mod correction;
pub mod error;
pub mod fetch;
pub mod format;
pub mod resolve;
pub mod table;

pub use correction::{correct, CorrectionOptions, CorrectionRequest, CorrectionResult, Corrector};
pub use error::{CorrectionError, ErrorKind};
pub use resolve::{LookupMode, StartPolicy};
