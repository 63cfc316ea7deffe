//! Name-based pairing ("marriage") of source and target files.
//!
//! Every file name from either side lands in exactly one [`PairingEntry`]:
//! - name on one side only: [`PairingEntry::Unmatched`] (an orphan)
//! - name once on each side: [`PairingEntry::Matched`]
//! - name repeated on the target side: [`PairingEntry::Accumulated`], where each
//!   later target path is put in front of everything collected so far
//!
//! Repeated names on the source side keep the first path seen.

#![allow(missing_docs)]

use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::scanner::walker::FileRecord;

/// Which tree a path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Resolved paths for one file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairingEntry {
    Unmatched { side: Side, path: PathBuf },
    Matched { source: PathBuf, target: PathBuf },
    Accumulated { paths: Vec<PathBuf> },
}

impl PairingEntry {
    /// Ordered path list: target before source for a match, newest target
    /// first for accumulated entries.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::Unmatched { path, .. } => vec![path.as_path()],
            Self::Matched { source, target } => vec![target.as_path(), source.as_path()],
            Self::Accumulated { paths } => paths.iter().map(PathBuf::as_path).collect(),
        }
    }

    /// Number of paths recorded, duplicates included.
    pub fn token_count(&self) -> usize {
        match self {
            Self::Unmatched { .. } => 1,
            Self::Matched { .. } => 2,
            Self::Accumulated { paths } => paths.len(),
        }
    }

    pub fn distinct_paths(&self) -> usize {
        self.paths().into_iter().collect::<HashSet<_>>().len()
    }

    /// Eligible for comparison: more than one distinct path.
    pub fn is_married(&self) -> bool {
        self.distinct_paths() > 1
    }

    /// Side of an orphan; `None` for every other entry.
    pub fn orphan_side(&self) -> Option<Side> {
        match self {
            Self::Unmatched { side, .. } => Some(*side),
            _ => None,
        }
    }

    fn into_paths(self) -> Vec<PathBuf> {
        match self {
            Self::Unmatched { path, .. } => vec![path],
            Self::Matched { source, target } => vec![target, source],
            Self::Accumulated { paths } => paths,
        }
    }

    fn absorb_target(&mut self, path: PathBuf) {
        let previous = std::mem::replace(self, Self::Accumulated { paths: Vec::new() });
        *self = match previous {
            Self::Unmatched {
                side: Side::Source,
                path: source,
            } => Self::Matched {
                source,
                target: path,
            },
            earlier => {
                let mut paths = vec![path];
                paths.extend(earlier.into_paths());
                Self::Accumulated { paths }
            }
        };
    }
}

/// Counts over a [`PairingMap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PairingSummary {
    pub names: usize,
    pub married: usize,
    pub source_only: usize,
    pub target_only: usize,
    /// Entries built from repeated target names.
    pub accumulated: usize,
}

/// File name → pairing entry. Each name appears once; iteration is by name.
///
/// Keys are raw OS file names, so names that differ only in undecodable bytes
/// stay apart. Serializes as an object keyed by the printable name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingMap {
    entries: BTreeMap<OsString, Named>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Named {
    name: String,
    entry: PairingEntry,
}

impl PairingMap {
    /// Merge the two scan results.
    pub fn pair(source: &[FileRecord], target: &[FileRecord]) -> Self {
        let mut entries = BTreeMap::new();

        for record in source {
            entries
                .entry(record.key.clone())
                .or_insert_with(|| Named {
                    name: record.name.clone(),
                    entry: PairingEntry::Unmatched {
                        side: Side::Source,
                        path: record.path.clone(),
                    },
                });
        }

        for record in target {
            match entries.entry(record.key.clone()) {
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(Named {
                        name: record.name.clone(),
                        entry: PairingEntry::Unmatched {
                            side: Side::Target,
                            path: record.path.clone(),
                        },
                    });
                }
                btree_map::Entry::Occupied(mut slot) => {
                    slot.get_mut().entry.absorb_target(record.path.clone());
                }
            }
        }

        Self { entries }
    }

    /// Entry for the exact file name.
    pub fn get(&self, name: impl AsRef<OsStr>) -> Option<&PairingEntry> {
        self.entries.get(name.as_ref()).map(|named| &named.entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(printable name, entry)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PairingEntry)> {
        self.entries
            .values()
            .map(|named| (named.name.as_str(), &named.entry))
    }

    /// Entries eligible for comparison.
    pub fn married(&self) -> impl Iterator<Item = (&str, &PairingEntry)> {
        self.iter().filter(|(_, entry)| entry.is_married())
    }

    /// Entries skipped by comparison.
    pub fn orphans(&self) -> impl Iterator<Item = (&str, &PairingEntry)> {
        self.iter().filter(|(_, entry)| !entry.is_married())
    }

    pub fn summary(&self) -> PairingSummary {
        let mut summary = PairingSummary {
            names: self.entries.len(),
            ..PairingSummary::default()
        };
        for (_, entry) in self.iter() {
            if entry.is_married() {
                summary.married += 1;
            }
            match entry {
                PairingEntry::Unmatched {
                    side: Side::Source, ..
                } => summary.source_only += 1,
                PairingEntry::Unmatched {
                    side: Side::Target, ..
                } => summary.target_only += 1,
                PairingEntry::Accumulated { .. } => summary.accumulated += 1,
                PairingEntry::Matched { .. } => {}
            }
        }
        summary
    }
}

impl Serialize for PairingMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, entry) in self.iter() {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

/// Pair two scan results by file name.
pub fn pair(source: &[FileRecord], target: &[FileRecord]) -> PairingMap {
    PairingMap::pair(source, target)
}
