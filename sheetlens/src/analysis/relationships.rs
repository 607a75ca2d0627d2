//! Detection of foreign-key-like links between regions.
//!
//! For every ordered pair of distinct regions and every pair of
//! type-compatible columns, the distinct sampled values of the source column
//! are looked up in the target column. A pair becomes a relationship when at
//! least [`DEFAULT_OVERLAP_THRESHOLD`] of the source values appear in the
//! target and at least two values are shared. Cardinality follows from which
//! side repeats its values:
//!
//! | source repeats | matched target values repeat | kind        |
//! |----------------|------------------------------|-------------|
//! | yes            | no                           | ManyToOne   |
//! | no             | yes                          | OneToMany   |
//! | no             | no                           | OneToOne    |
//! | yes            | yes                          | (none)      |
//!
//! Only one relationship is kept per unordered column pair, attached to its
//! source region. A ManyToOne direction always wins, so a link between a
//! repeating column and a key column is stored on the repeating side.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use super::inference::numeric_value;
use crate::grid::{format_number, CellValue};
use crate::model::{Cardinality, DataType, Region, Relationship};

/// Minimum share of source values that must appear in the target column.
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.8;

/// Minimum number of distinct shared values.
pub const DEFAULT_MIN_SHARED_VALUES: usize = 2;

/// Distinct sampled values of one column and how often each occurs.
#[derive(Debug)]
struct ColumnProfile {
    region: usize,
    column: usize,
    data_type: DataType,
    counts: HashMap<String, usize>,
}

impl ColumnProfile {
    fn build(region_index: usize, region: &Region, column: usize) -> Option<Self> {
        let header = region.headers.get(column)?;
        let data_type = region.column_type(header)?;
        if !matches!(
            data_type,
            DataType::Text | DataType::Number | DataType::Currency
        ) {
            return None;
        }

        let mut counts = HashMap::new();
        for value in region.sample_column(column) {
            if let Some(key) = join_key(value, data_type) {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        if counts.is_empty() {
            return None;
        }
        Some(Self {
            region: region_index,
            column,
            data_type,
            counts,
        })
    }

    fn has_repeats(&self) -> bool {
        self.counts.values().any(|&n| n > 1)
    }
}

/// Normalized comparison key for a sampled value. Text is trimmed and compared
/// case-sensitively; numeric columns compare by parsed value.
fn join_key(value: &CellValue, data_type: DataType) -> Option<String> {
    if value.is_blank() {
        return None;
    }
    if data_type.is_numeric() {
        return numeric_value(value).map(format_number);
    }
    Some(value.as_text())
}

#[derive(Debug, Clone)]
struct Candidate {
    source: (usize, usize),
    target: (usize, usize),
    kind: Cardinality,
    overlap: f64,
}

impl Candidate {
    fn pair_key(&self) -> ((usize, usize), (usize, usize)) {
        if self.source <= self.target {
            (self.source, self.target)
        } else {
            (self.target, self.source)
        }
    }

    /// Returns true if `self` should replace `other` for the same column pair.
    fn beats(&self, other: &Candidate) -> bool {
        let many_to_one = |c: &Candidate| c.kind == Cardinality::ManyToOne;
        if many_to_one(self) != many_to_one(other) {
            return many_to_one(self);
        }
        self.overlap - other.overlap > f64::EPSILON
    }
}

/// Finds relationships between the regions of an analysis.
#[derive(Debug, Clone)]
pub struct RelationshipInferrer {
    overlap_threshold: f64,
    min_shared_values: usize,
}

impl RelationshipInferrer {
    pub fn new() -> Self {
        Self {
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            min_shared_values: DEFAULT_MIN_SHARED_VALUES,
        }
    }

    pub fn with_overlap_threshold(mut self, threshold: f64) -> Self {
        self.overlap_threshold = threshold;
        self
    }

    pub fn with_min_shared_values(mut self, min_shared_values: usize) -> Self {
        self.min_shared_values = min_shared_values;
        self
    }

    /// Relationships between `regions`, paired with the index of their source region.
    ///
    /// The output order is deterministic: source region, then target region,
    /// then column order.
    pub fn infer(&self, regions: &[Region]) -> Vec<(usize, Relationship)> {
        // Columns with fewer distinct values than required can never link
        let min_distinct = self.min_shared_values.max(1);
        let profiles: Vec<ColumnProfile> = regions
            .iter()
            .enumerate()
            .flat_map(|(ri, region)| {
                (0..region.headers.len()).filter_map(move |ci| ColumnProfile::build(ri, region, ci))
            })
            .filter(|profile| profile.counts.len() >= min_distinct)
            .collect();

        let mut best: HashMap<((usize, usize), (usize, usize)), usize> = HashMap::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        for source in &profiles {
            for target in &profiles {
                if source.region == target.region
                    || !source.data_type.is_join_compatible(&target.data_type)
                {
                    continue;
                }
                let Some(candidate) = self.evaluate(source, target) else {
                    continue;
                };
                match best.get(&candidate.pair_key()) {
                    Some(&index) if !candidate.beats(&candidates[index]) => {}
                    Some(&index) => candidates[index] = candidate,
                    None => {
                        best.insert(candidate.pair_key(), candidates.len());
                        candidates.push(candidate);
                    }
                }
            }
        }

        candidates.sort_by_key(|c| (c.source, c.target));
        candidates
            .into_iter()
            .map(|c| {
                let (sr, sc) = c.source;
                let (tr, tc) = c.target;
                let relationship = Relationship {
                    source_region: regions[sr].reference(),
                    source_column: regions[sr].headers[sc].clone(),
                    target_region: regions[tr].reference(),
                    target_column: regions[tr].headers[tc].clone(),
                    kind: c.kind,
                    overlap: c.overlap,
                };
                (sr, relationship)
            })
            .collect()
    }

    /// Infers relationships and attaches each one to its source region.
    ///
    /// Returns the number of relationships found.
    #[instrument(skip_all, fields(regions = regions.len()))]
    pub fn apply(&self, regions: &mut [Region]) -> usize {
        let found = self.infer(regions);
        let count = found.len();
        for (index, relationship) in found {
            debug!(relationship = %relationship.describe(), "Detected relationship");
            regions[index].relationships.push(relationship);
        }
        count
    }

    fn evaluate(&self, source: &ColumnProfile, target: &ColumnProfile) -> Option<Candidate> {
        let shared: HashSet<&String> = source
            .counts
            .keys()
            .filter(|key| target.counts.contains_key(*key))
            .collect();
        if shared.len() < self.min_shared_values.max(1) {
            return None;
        }
        let overlap = shared.len() as f64 / source.counts.len() as f64;
        if overlap < self.overlap_threshold {
            return None;
        }

        let target_repeats = shared.iter().any(|key| target.counts[*key] > 1);
        let kind = match (source.has_repeats(), target_repeats) {
            (true, false) => Cardinality::ManyToOne,
            (false, true) => Cardinality::OneToMany,
            (false, false) => Cardinality::OneToOne,
            (true, true) => return None,
        };
        Some(Candidate {
            source: (source.region, source.column),
            target: (target.region, target.column),
            kind,
            overlap,
        })
    }
}

impl Default for RelationshipInferrer {
    fn default() -> Self {
        Self::new()
    }
}
