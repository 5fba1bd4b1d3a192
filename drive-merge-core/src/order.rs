//! Deterministic ordering of chunk files before concatenation.
//!
//! Files named `chunk_<n>_*` sort by ascending `n`; everything else sorts
//! after all numbered chunks, ordered by (name, createdTime, id). The sort
//! is stable and idempotent, so the merge order is reproducible even when
//! concurrent uploads share a timestamp.

use crate::contract::RemoteFile;

/// Position of a file relative to the numbered chunk sequence.
///
/// `Numbered(n)` always orders before `Unnumbered` (derived variant order),
/// so no sentinel constant is needed for non-chunk files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChunkOrder {
    Numbered(u64),
    Unnumbered,
}

/// Full sort key for one remote file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderKey {
    pub order: ChunkOrder,
    pub name: String,
    pub created_time: String,
    pub id: String,
}

impl OrderKey {
    pub fn for_file(file: &RemoteFile) -> Self {
        OrderKey {
            order: chunk_order(&file.name),
            name: file.name.clone(),
            created_time: file.created_time.clone(),
            id: file.id.clone(),
        }
    }
}

/// Parse the numeric chunk prefix out of a file name, if present.
pub fn chunk_order(name: &str) -> ChunkOrder {
    let Some(rest) = name.strip_prefix("chunk_") else {
        return ChunkOrder::Unnumbered;
    };
    // Only `chunk_<digits>_*` counts; `chunk_3.pdf` has no second
    // underscore and stays unnumbered.
    let digits = rest.split('_').next().unwrap_or("");
    match digits.parse::<u64>() {
        Ok(n) => ChunkOrder::Numbered(n),
        Err(_) => ChunkOrder::Unnumbered,
    }
}

/// Sort files into merge order. Stable, deterministic, idempotent.
pub fn sort_files(files: &mut [RemoteFile]) {
    files.sort_by_cached_key(OrderKey::for_file);
}
