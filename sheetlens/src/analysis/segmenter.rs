//! Splits a sheet's used range into rectangular regions.
//!
//! Occupied cells are grouped into 4-connected clusters. Cluster bounding
//! boxes that are separated by no more than one fully blank row or column are
//! then merged repeatedly until nothing changes, so a single blank spacer row
//! inside a table does not split it while two or more blank rows do.

use std::collections::VecDeque;

use tracing::{debug, instrument};

use crate::grid::{CellData, CellRange};

/// Occupancy bitmap of a block, relative to its origin.
#[derive(Debug, Clone)]
pub struct OccupancyMask {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl OccupancyMask {
    pub fn from_block(block: &[Vec<CellData>]) -> Self {
        let rows = block.len();
        let cols = block.iter().map(Vec::len).max().unwrap_or(0);
        let mut cells = vec![false; rows * cols];
        for (r, row) in block.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                cells[r * cols + c] = cell.is_occupied();
            }
        }
        Self { rows, cols, cells }
    }

    pub fn is_occupied(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols && self.cells[row * self.cols + col]
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Bounding boxes of 4-connected occupied clusters, relative to the origin.
    pub fn clusters(&self) -> Vec<CellRange> {
        let mut visited = vec![false; self.cells.len()];
        let mut boxes = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..self.cells.len() {
            if !self.cells[start] || visited[start] {
                continue;
            }
            visited[start] = true;
            queue.push_back(start);
            let (r0, c0) = (start / self.cols, start % self.cols);
            let mut bounds = CellRange::cell(r0 as u32, c0 as u32);

            while let Some(index) = queue.pop_front() {
                let (r, c) = (index / self.cols, index % self.cols);
                bounds = bounds.union(&CellRange::cell(r as u32, c as u32));

                let mut visit = |nr: usize, nc: usize| {
                    let next = nr * self.cols + nc;
                    if self.cells[next] && !visited[next] {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                };
                if r > 0 {
                    visit(r - 1, c);
                }
                if r + 1 < self.rows {
                    visit(r + 1, c);
                }
                if c > 0 {
                    visit(r, c - 1);
                }
                if c + 1 < self.cols {
                    visit(r, c + 1);
                }
            }
            boxes.push(bounds);
        }
        boxes
    }
}

/// Finds the regions of a sheet.
#[derive(Debug, Clone)]
pub struct RegionSegmenter {
    /// Blank rows or columns that may separate two parts of one region
    gap_tolerance: u32,
}

impl RegionSegmenter {
    pub fn new() -> Self {
        Self { gap_tolerance: 1 }
    }

    /// Sets how many blank rows or columns may sit inside a region.
    pub fn with_gap_tolerance(mut self, gap_tolerance: u32) -> Self {
        self.gap_tolerance = gap_tolerance;
        self
    }

    /// Segments a block read from `origin` into regions in absolute
    /// coordinates, ordered by top row and then left column.
    ///
    /// Regions never overlap, and every occupied cell of the block lies in
    /// exactly one region.
    #[instrument(skip(self, block), fields(origin = %origin))]
    pub fn segment(&self, block: &[Vec<CellData>], origin: CellRange) -> Vec<CellRange> {
        let mask = OccupancyMask::from_block(block);
        let clusters = mask.clusters();
        let cluster_count = clusters.len();

        let mut regions: Vec<CellRange> = self
            .merge(clusters)
            .into_iter()
            .map(|r| {
                CellRange::new(
                    r.first_row + origin.first_row,
                    r.first_col + origin.first_col,
                    r.last_row + origin.first_row,
                    r.last_col + origin.first_col,
                )
            })
            .collect();
        regions.sort();

        debug!(
            occupied = mask.occupied_count(),
            clusters = cluster_count,
            regions = regions.len(),
            "Segmented block"
        );
        regions
    }

    fn mergeable(&self, a: &CellRange, b: &CellRange) -> bool {
        a.row_gap(b) <= self.gap_tolerance && a.col_gap(b) <= self.gap_tolerance
    }

    /// Merges boxes within the gap tolerance until no pair qualifies.
    fn merge(&self, mut boxes: Vec<CellRange>) -> Vec<CellRange> {
        loop {
            boxes.sort();
            let mut changed = false;
            let mut merged: Vec<CellRange> = Vec::with_capacity(boxes.len());

            'next: for candidate in boxes {
                for existing in merged.iter_mut() {
                    if self.mergeable(existing, &candidate) {
                        *existing = existing.union(&candidate);
                        changed = true;
                        continue 'next;
                    }
                }
                merged.push(candidate);
            }

            boxes = merged;
            if !changed {
                return boxes;
            }
        }
    }
}

impl Default for RegionSegmenter {
    fn default() -> Self {
        Self::new()
    }
}
