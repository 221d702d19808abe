use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// Maps a lower-cased label to a sort rank. Lower ranks sort first.
pub trait RankTable {
    /// Ordered `(substrings, rank)` pairs; the first entry with a matching
    /// substring wins.
    const TABLE: &'static [(&'static [&'static str], u8)];
    /// Rank for labels that match nothing in `TABLE`.
    const UNRANKED: u8;

    fn rank(lower: &str) -> u8 {
        Self::TABLE
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
            .map(|(_, rank)| *rank)
            .unwrap_or(Self::UNRANKED)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusRanks;

impl RankTable for StatusRanks {
    const TABLE: &'static [(&'static [&'static str], u8)] = &[
        (&["done", "completed"], 1),
        (&["in progress"], 2),
        (&["stuck", "blocked"], 3),
        (&["waiting for review"], 4),
        (&["ready for testing", "not started"], 5),
        (&["removed"], 6),
    ];
    const UNRANKED: u8 = 7;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriorityRanks;

impl RankTable for PriorityRanks {
    const TABLE: &'static [(&'static [&'static str], u8)] = &[
        (&["critical"], 1),
        (&["high"], 2),
        (&["medium"], 3),
        (&["low"], 4),
    ];
    const UNRANKED: u8 = 5;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeRanks;

impl RankTable for TypeRanks {
    const TABLE: &'static [(&'static [&'static str], u8)] = &[
        (&["bug"], 1),
        (&["feature"], 2),
        (&["test"], 3),
        (&["security"], 4),
        (&["quality", "improvement"], 5),
        (&["other"], 6),
    ];
    const UNRANKED: u8 = 7;
}

/// An open-ended label (status, priority, type) that keeps the raw text the
/// remote service returned alongside its precomputed sort rank.
///
/// Serialized as the plain string; the rank is recomputed on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<K> {
    raw: String,
    rank: u8,
    kind: PhantomData<K>,
}

pub type Status = Label<StatusRanks>;
pub type Priority = Label<PriorityRanks>;
pub type TaskType = Label<TypeRanks>;

impl<K: RankTable> Label<K> {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let rank = K::rank(&raw.to_lowercase());
        Self {
            raw,
            rank,
            kind: PhantomData,
        }
    }

    pub fn rank(&self) -> u8 {
        self.rank
    }
}

impl<K> Label<K> {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl<K: RankTable> Default for Label<K> {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl<K: RankTable> From<&str> for Label<K> {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl<K: RankTable> From<String> for Label<K> {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl<K> fmt::Display for Label<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl<K> Serialize for Label<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de, K: RankTable> Deserialize<'de> for Label<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}
