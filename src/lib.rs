#![forbid(unsafe_code)]

//! pairdiff: pairs identically named files across two directory trees and
//! hands every pair to an external diff service.
//!
//! Pipeline, run once per invocation and strictly in sequence:
//! 1. **Scan**: recursively list the regular files of the source and target
//!    roots, optionally dropping metadata files by suffix
//! 2. **Pair**: marry files by base name; names seen on one side only are orphans
//! 3. **Dispatch**: run the external comparator once per married entry
//!
//! # Library usage
//!
//! ```rust,no_run
//! use pairdiff::prelude::*;
//!
//! # fn main() -> pairdiff::core::errors::Result<()> {
//! let settings = Config::load(None)?.resolve()?;
//! let scanner = DirectoryScanner::new(settings.scan.clone());
//! let pairs = PairingMap::pair(
//!     &scanner.scan(&settings.source_root)?,
//!     &scanner.scan(&settings.target_root)?,
//! );
//! let comparator = ProcessComparator::new(settings.comparator.clone());
//! let report = Dispatcher::new(&comparator).dispatch(&pairs);
//! println!("{} compared, {} failed", report.attempted(), report.failed());
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod core;
pub mod dispatch;
pub mod logger;
pub mod pairing;
pub mod runner;
pub mod scanner;
