//! Product sub-matcher
//!
//! Patterns: `GRIB1,origin,table,product`, `GRIB2,centre,discipline,
//! category,number`, `BUFR,type,subtype,localsubtype`.

use std::fmt;

use super::errors::{MatcherError, MatcherResult};
use super::utils::{CommaJoiner, OptionalCommaList};
use crate::types::{Attribute, Product};

/// Matches product attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchProduct {
    /// Match GRIB1-style products
    Grib1 {
        /// Originating centre, None for any
        origin: Option<i64>,
        /// Parameter table, None for any
        table: Option<i64>,
        /// Parameter number, None for any
        product: Option<i64>,
    },
    /// Match GRIB2-style products
    Grib2 {
        /// Originating centre, None for any
        centre: Option<i64>,
        /// Parameter discipline, None for any
        discipline: Option<i64>,
        /// Parameter category, None for any
        category: Option<i64>,
        /// Parameter number, None for any
        number: Option<i64>,
    },
    /// Match BUFR-style products
    Bufr {
        /// Data category, None for any
        kind: Option<i64>,
        /// Data subcategory, None for any
        subtype: Option<i64>,
        /// Local subcategory, None for any
        local_subtype: Option<i64>,
    },
}

fn opt(args: &OptionalCommaList, pos: usize) -> MatcherResult<Option<i64>> {
    if args.has(pos) {
        Ok(Some(args.get_int(pos, 0)?))
    } else {
        Ok(None)
    }
}

fn accepts(want: Option<i64>, have: i64) -> bool {
    want.map(|w| w == have).unwrap_or(true)
}

impl MatchProduct {
    /// Parse a product pattern
    pub fn parse(pattern: &str) -> MatcherResult<MatchProduct> {
        let args = OptionalCommaList::new(pattern);
        let style = args.get(0, "").to_uppercase();
        match style.as_str() {
            "GRIB1" => Ok(MatchProduct::Grib1 {
                origin: opt(&args, 1)?,
                table: opt(&args, 2)?,
                product: opt(&args, 3)?,
            }),
            "GRIB2" => Ok(MatchProduct::Grib2 {
                centre: opt(&args, 1)?,
                discipline: opt(&args, 2)?,
                category: opt(&args, 3)?,
                number: opt(&args, 4)?,
            }),
            "BUFR" => Ok(MatchProduct::Bufr {
                kind: opt(&args, 1)?,
                subtype: opt(&args, 2)?,
                local_subtype: opt(&args, 3)?,
            }),
            other => Err(MatcherError::parse(
                pattern,
                format!("unknown product style {:?}", other),
            )),
        }
    }

    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        let product = match attr {
            Attribute::Product(product) => product,
            _ => return false,
        };
        match (self, product) {
            (
                MatchProduct::Grib1 {
                    origin,
                    table,
                    product,
                },
                Product::Grib1 {
                    origin: o,
                    table: t,
                    product: p,
                },
            ) => {
                accepts(*origin, *o as i64)
                    && accepts(*table, *t as i64)
                    && accepts(*product, *p as i64)
            }
            (
                MatchProduct::Grib2 {
                    centre,
                    discipline,
                    category,
                    number,
                },
                Product::Grib2 {
                    centre: c,
                    discipline: d,
                    category: cat,
                    number: n,
                },
            ) => {
                accepts(*centre, *c as i64)
                    && accepts(*discipline, *d as i64)
                    && accepts(*category, *cat as i64)
                    && accepts(*number, *n as i64)
            }
            (
                MatchProduct::Bufr {
                    kind,
                    subtype,
                    local_subtype,
                },
                Product::Bufr {
                    kind: k,
                    subtype: s,
                    local_subtype: l,
                },
            ) => {
                accepts(*kind, *k as i64)
                    && accepts(*subtype, *s as i64)
                    && accepts(*local_subtype, *l as i64)
            }
            _ => false,
        }
    }
}

impl fmt::Display for MatchProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut joiner = CommaJoiner::new();
        let fields: Vec<Option<i64>> = match self {
            MatchProduct::Grib1 {
                origin,
                table,
                product,
            } => {
                joiner.add("GRIB1");
                vec![*origin, *table, *product]
            }
            MatchProduct::Grib2 {
                centre,
                discipline,
                category,
                number,
            } => {
                joiner.add("GRIB2");
                vec![*centre, *discipline, *category, *number]
            }
            MatchProduct::Bufr {
                kind,
                subtype,
                local_subtype,
            } => {
                joiner.add("BUFR");
                vec![*kind, *subtype, *local_subtype]
            }
        };
        for field in fields {
            match field {
                Some(v) => joiner.add(v),
                None => joiner.add_undef(),
            };
        }
        write!(f, "{}", joiner.join())
    }
}
