//! Dense grid over metadata attribute combinations
//!
//! A [`MetadataGrid`] collects, per attribute type, the set of values seen
//! along that axis, then freezes into a space where every combination of
//! one value per axis has a unique dense index. Useful to lay out query
//! results as an N-dimensional matrix or to detect missing combinations.
//!
//! Lifecycle is two-phase: [`MetadataGrid::add`] while open, then
//! [`MetadataGrid::consolidate`], after which only [`MetadataGrid::index`]
//! queries are allowed.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::metadata::Metadata;
use crate::types::{Attribute, Code};

/// Errors from grid construction and lookup
#[derive(Debug, Error)]
pub enum GridError {
    /// add() after consolidate()
    #[error("grid is already consolidated and cannot accept new values")]
    Frozen,
    /// index() before consolidate()
    #[error("grid has not been consolidated yet")]
    NotConsolidated,
    /// The metadata carries no value for a grid axis
    #[error("metadata has no {0} attribute, required by the grid")]
    MissingAxis(&'static str),
    /// The metadata value is not on the axis
    #[error("metadata {attribute} value is not one of the grid's axis values")]
    ValueNotInGrid {
        /// The axis the value was looked up on
        attribute: &'static str,
    },
}

/// Result alias for grid operations
pub type GridResult<T> = Result<T, GridError>;

/// Attribute-combination space with dense indexing.
#[derive(Debug, Clone, Default)]
pub struct MetadataGrid {
    axes: BTreeMap<Code, Vec<Attribute>>,
    consolidated: bool,
}

impl MetadataGrid {
    /// Creates an empty, open grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one value to the axis for its attribute type.
    ///
    /// Duplicate values are ignored. Fails once the grid is consolidated.
    pub fn add(&mut self, attr: Attribute) -> GridResult<()> {
        if self.consolidated {
            return Err(GridError::Frozen);
        }
        let axis = self.axes.entry(attr.code()).or_default();
        if !axis.contains(&attr) {
            axis.push(attr);
        }
        Ok(())
    }

    /// Adds every attribute of a metadata item to the grid
    pub fn add_all(&mut self, md: &Metadata) -> GridResult<()> {
        for (_, attr) in md.iter() {
            self.add(attr.clone())?;
        }
        Ok(())
    }

    /// Sorts each axis and freezes the grid.
    ///
    /// Idempotent; after this, indices are stable.
    pub fn consolidate(&mut self) {
        if self.consolidated {
            return;
        }
        for axis in self.axes.values_mut() {
            axis.sort();
        }
        self.consolidated = true;
    }

    /// Number of axes
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    /// The values along one axis, in index order once consolidated
    pub fn axis(&self, code: Code) -> Option<&[Attribute]> {
        self.axes.get(&code).map(|v| v.as_slice())
    }

    /// Total number of combinations: the product of axis lengths.
    ///
    /// An empty grid has one combination, the empty one.
    pub fn max_index(&self) -> usize {
        self.axes.values().map(|axis| axis.len()).product()
    }

    /// The dense index of a metadata item's combination.
    ///
    /// Axes are scanned in type-code order with the first axis most
    /// significant. The metadata must carry a value for every axis, and
    /// every value must be on its axis.
    pub fn index(&self, md: &Metadata) -> GridResult<usize> {
        if !self.consolidated {
            return Err(GridError::NotConsolidated);
        }
        let mut index = 0usize;
        for (code, axis) in &self.axes {
            let attr = md
                .get(*code)
                .ok_or(GridError::MissingAxis(code.name()))?;
            let position = axis
                .binary_search(attr)
                .map_err(|_| GridError::ValueNotInGrid {
                    attribute: code.name(),
                })?;
            index = index * axis.len() + position;
        }
        Ok(index)
    }
}
