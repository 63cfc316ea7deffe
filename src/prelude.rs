//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use pairdiff::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, Overrides, RunSettings};
pub use crate::core::errors::{PdError, Result};

// Scanner
pub use crate::scanner::walker::{DirectoryScanner, FileRecord, ScanOptions};

// Pairing
pub use crate::pairing::pairer::{PairingEntry, PairingMap, PairingSummary, Side};

// Dispatch
pub use crate::dispatch::comparator::{Comparator, ComparatorSettings, ProcessComparator};
pub use crate::dispatch::dispatcher::{DispatchReport, Dispatcher, JobOutcome, JobStatus};

// Runner
pub use crate::runner::{RunReport, Runner};
