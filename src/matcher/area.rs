//! Area sub-matcher
//!
//! Two forms:
//!
//! - `GRIB:lat=45000,lon=11000` — every listed key must be present in the
//!   area's value bag with an equal value.
//! - `bbox covers POLYGON(...)` / `bbox equals POLYGON(...)` — geometric
//!   predicate, delegated to an externally provided [`GeometryOracle`].
//!   Without an oracle installed on the parser, bbox patterns are parse
//!   errors.

use std::fmt;
use std::sync::Arc;

use super::errors::{MatcherError, MatcherResult};
use crate::types::{Attribute, ValueBag};

/// External geometric predicate over area value bags.
///
/// Implementations own the geometry engine; the matcher treats them as an
/// opaque oracle.
pub trait GeometryOracle: Send + Sync {
    /// True if the area covers the given geometry text
    fn covers(&self, area: &ValueBag, geometry: &str) -> bool;
    /// True if the area equals the given geometry text
    fn equals(&self, area: &ValueBag, geometry: &str) -> bool;
}

/// Bounding box predicate kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BboxOp {
    /// Area covers the geometry
    Covers,
    /// Area equals the geometry
    Equals,
}

/// Matches area attributes
#[derive(Clone)]
pub enum MatchArea {
    /// Value bag containment
    Values(ValueBag),
    /// Geometric predicate through the installed oracle
    Bbox {
        /// Predicate kind
        op: BboxOp,
        /// Geometry text handed verbatim to the oracle
        geometry: String,
        /// The oracle to consult
        oracle: Arc<dyn GeometryOracle>,
    },
}

impl fmt::Debug for MatchArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchArea::Values(bag) => f.debug_tuple("Values").field(bag).finish(),
            MatchArea::Bbox { op, geometry, .. } => f
                .debug_struct("Bbox")
                .field("op", op)
                .field("geometry", geometry)
                .finish(),
        }
    }
}

impl MatchArea {
    /// Parse an area pattern
    pub fn parse(
        pattern: &str,
        oracle: Option<&Arc<dyn GeometryOracle>>,
    ) -> MatcherResult<MatchArea> {
        let trimmed = pattern.trim();
        if let Some(rest) = trimmed.strip_prefix("bbox ") {
            let oracle = oracle.ok_or_else(|| {
                MatcherError::parse(pattern, "bbox matching requires a geometry oracle")
            })?;
            let (op_text, geometry) = rest
                .trim()
                .split_once(' ')
                .ok_or_else(|| MatcherError::parse(pattern, "expected 'bbox <op> <geometry>'"))?;
            let op = match op_text {
                "covers" | "coveredby" => BboxOp::Covers,
                "equals" => BboxOp::Equals,
                other => {
                    return Err(MatcherError::parse(
                        pattern,
                        format!("unknown bbox operator {:?}", other),
                    ))
                }
            };
            return Ok(MatchArea::Bbox {
                op,
                geometry: geometry.trim().to_string(),
                oracle: Arc::clone(oracle),
            });
        }

        let rest = trimmed
            .strip_prefix("GRIB:")
            .or_else(|| trimmed.strip_prefix("grib:"))
            .ok_or_else(|| MatcherError::parse(pattern, "expected 'GRIB:key=value,...'"))?;
        let bag =
            ValueBag::parse(rest).map_err(|message| MatcherError::parse(pattern, message))?;
        if bag.is_empty() {
            return Err(MatcherError::parse(pattern, "empty area value list"));
        }
        Ok(MatchArea::Values(bag))
    }

    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        let area = match attr {
            Attribute::Area(bag) => bag,
            _ => return false,
        };
        match self {
            MatchArea::Values(wanted) => area.contains(wanted),
            MatchArea::Bbox {
                op,
                geometry,
                oracle,
            } => match op {
                BboxOp::Covers => oracle.covers(area, geometry),
                BboxOp::Equals => oracle.equals(area, geometry),
            },
        }
    }
}

impl fmt::Display for MatchArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchArea::Values(bag) => write!(f, "GRIB:{}", bag),
            MatchArea::Bbox { op, geometry, .. } => {
                let op_text = match op {
                    BboxOp::Covers => "covers",
                    BboxOp::Equals => "equals",
                };
                write!(f, "bbox {} {}", op_text, geometry)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(values: &str) -> Attribute {
        Attribute::Area(ValueBag::parse(values).unwrap())
    }

    #[test]
    fn test_value_subset_match() {
        let m = MatchArea::parse("GRIB:lat=45000", None).unwrap();
        assert!(m.matches(&area("lat=45000, lon=11000")));
        assert!(!m.matches(&area("lat=1, lon=11000")));
    }

    #[test]
    fn test_all_keys_required() {
        let m = MatchArea::parse("GRIB:lat=45000,lon=11000", None).unwrap();
        assert!(!m.matches(&area("lat=45000")));
    }

    #[test]
    fn test_bbox_without_oracle_is_parse_error() {
        let err = MatchArea::parse("bbox covers POLYGON((1 2))", None).unwrap_err();
        assert!(err.to_string().contains("geometry oracle"));
    }

    struct AlwaysInside;

    impl GeometryOracle for AlwaysInside {
        fn covers(&self, _area: &ValueBag, _geometry: &str) -> bool {
            true
        }
        fn equals(&self, _area: &ValueBag, _geometry: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_bbox_delegates_to_oracle() {
        let oracle: Arc<dyn GeometryOracle> = Arc::new(AlwaysInside);
        let covers = MatchArea::parse("bbox covers POLYGON((1 2))", Some(&oracle)).unwrap();
        let equals = MatchArea::parse("bbox equals POLYGON((1 2))", Some(&oracle)).unwrap();
        assert!(covers.matches(&area("lat=1")));
        assert!(!equals.matches(&area("lat=1")));
    }
}
