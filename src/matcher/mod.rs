//! Metadata matching expressions
//!
//! A match expression is a conjunction of per-type clauses separated by `;`
//! or newlines. Each clause is `type:subexpr`, where the sub-expression may
//! list OR alternatives separated by ` or `:
//!
//! ```text
//! origin:GRIB1,98 or GRIB1,200; reftime:>=2007-04-01,<=2007-05-10
//! ```
//!
//! Sub-parsers are registered on a [`Parser`] instance, constructed
//! explicitly and passed where needed; there is no global registry. A
//! metadata item matches when every clause's type is present and accepted
//! by at least one alternative. Parse failures are reported before any
//! storage is touched; evaluation itself never fails.

mod area;
mod errors;
mod level;
mod origin;
mod proddef;
mod product;
mod quantity;
mod reftime;
mod run;
mod task;
mod timerange;
mod utils;

pub use area::{BboxOp, GeometryOracle, MatchArea};
pub use errors::{MatcherError, MatcherResult};
pub use level::MatchLevel;
pub use origin::MatchOrigin;
pub use proddef::MatchProddef;
pub use product::MatchProduct;
pub use quantity::MatchQuantity;
pub use reftime::{BoundOp, MatchReftime};
pub use run::MatchRun;
pub use task::MatchTask;
pub use timerange::MatchTimerange;
pub use utils::{CommaJoiner, OptionalCommaList};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::metadata::Metadata;
use crate::types::{Attribute, Code};

/// One per-type sub-matcher alternative.
#[derive(Debug, Clone)]
pub enum AttrMatcher {
    /// Origin clause
    Origin(MatchOrigin),
    /// Product clause
    Product(MatchProduct),
    /// Level clause
    Level(MatchLevel),
    /// Timerange clause
    Timerange(MatchTimerange),
    /// Reftime clause
    Reftime(MatchReftime),
    /// Area clause
    Area(MatchArea),
    /// Proddef clause
    Proddef(MatchProddef),
    /// Run clause
    Run(MatchRun),
    /// Task clause
    Task(MatchTask),
    /// Quantity clause
    Quantity(MatchQuantity),
}

impl AttrMatcher {
    /// Match against an attribute
    pub fn matches(&self, attr: &Attribute) -> bool {
        match self {
            AttrMatcher::Origin(m) => m.matches(attr),
            AttrMatcher::Product(m) => m.matches(attr),
            AttrMatcher::Level(m) => m.matches(attr),
            AttrMatcher::Timerange(m) => m.matches(attr),
            AttrMatcher::Reftime(m) => m.matches(attr),
            AttrMatcher::Area(m) => m.matches(attr),
            AttrMatcher::Proddef(m) => m.matches(attr),
            AttrMatcher::Run(m) => m.matches(attr),
            AttrMatcher::Task(m) => m.matches(attr),
            AttrMatcher::Quantity(m) => m.matches(attr),
        }
    }
}

impl fmt::Display for AttrMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrMatcher::Origin(m) => write!(f, "{}", m),
            AttrMatcher::Product(m) => write!(f, "{}", m),
            AttrMatcher::Level(m) => write!(f, "{}", m),
            AttrMatcher::Timerange(m) => write!(f, "{}", m),
            AttrMatcher::Reftime(m) => write!(f, "{}", m),
            AttrMatcher::Area(m) => write!(f, "{}", m),
            AttrMatcher::Proddef(m) => write!(f, "{}", m),
            AttrMatcher::Run(m) => write!(f, "{}", m),
            AttrMatcher::Task(m) => write!(f, "{}", m),
            AttrMatcher::Quantity(m) => write!(f, "{}", m),
        }
    }
}

/// ORed list of sub-matchers for one type.
#[derive(Debug, Clone)]
pub struct OrMatcher {
    alternatives: Vec<AttrMatcher>,
}

impl OrMatcher {
    /// Match against an attribute: true if any alternative accepts it
    pub fn matches(&self, attr: &Attribute) -> bool {
        self.alternatives.iter().any(|m| m.matches(attr))
    }

    /// The alternatives in parse order
    pub fn alternatives(&self) -> &[AttrMatcher] {
        &self.alternatives
    }
}

impl fmt::Display for OrMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.alternatives.iter().map(|m| m.to_string()).collect();
        write!(f, "{}", rendered.join(" or "))
    }
}

/// A parsed match expression: an AND over per-type OR lists.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    clauses: BTreeMap<Code, OrMatcher>,
}

impl Matcher {
    /// The empty matcher, which matches everything
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if there are no clauses
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The OR clause for a code, if present
    pub fn get(&self, code: Code) -> Option<&OrMatcher> {
        self.clauses.get(&code)
    }

    /// Iterate clauses in type-code order
    pub fn iter(&self) -> impl Iterator<Item = (&Code, &OrMatcher)> {
        self.clauses.iter()
    }

    /// Match a full metadata item.
    ///
    /// Every clause's type must be present in the metadata and accepted by
    /// that clause; clauses for absent types fail the match.
    pub fn matches(&self, md: &Metadata) -> bool {
        self.clauses.iter().all(|(code, clause)| {
            md.get(*code)
                .map(|attr| clause.matches(attr))
                .unwrap_or(false)
        })
    }

    /// The reftime interval implied by the reftime clause, for index
    /// pruning. (None, None) when no reftime clause is present.
    pub fn reftime_extremes(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        let clause = match self.clauses.get(&Code::Reftime) {
            Some(clause) => clause,
            None => return (None, None),
        };
        // The union over OR alternatives: widest bounds win
        let mut lower: Option<NaiveDateTime> = None;
        let mut upper: Option<NaiveDateTime> = None;
        let mut lower_unbounded = false;
        let mut upper_unbounded = false;
        for alt in &clause.alternatives {
            if let AttrMatcher::Reftime(m) = alt {
                let (alt_lower, alt_upper) = m.date_extremes();
                match alt_lower {
                    Some(candidate) => {
                        lower = Some(lower.map_or(candidate, |cur| cur.min(candidate)))
                    }
                    None => lower_unbounded = true,
                }
                match alt_upper {
                    Some(candidate) => {
                        upper = Some(upper.map_or(candidate, |cur| cur.max(candidate)))
                    }
                    None => upper_unbounded = true,
                }
            }
        }
        (
            if lower_unbounded { None } else { lower },
            if upper_unbounded { None } else { upper },
        )
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .clauses
            .iter()
            .map(|(code, clause)| format!("{}:{}", code.name(), clause))
            .collect();
        write!(f, "{}", rendered.join("; "))
    }
}

/// Matcher parser with an explicit sub-parser registry.
///
/// One Parser instance is constructed per context (dataset pool, test) and
/// threaded through calls; it optionally carries a geometry oracle for bbox
/// area expressions.
#[derive(Default, Clone)]
pub struct Parser {
    geometry: Option<Arc<dyn GeometryOracle>>,
}

impl Parser {
    /// Creates a parser with all built-in matcher types registered
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser that can also evaluate bbox area expressions
    pub fn with_geometry(oracle: Arc<dyn GeometryOracle>) -> Self {
        Self {
            geometry: Some(oracle),
        }
    }

    /// The matcher type names this parser understands
    pub fn type_names(&self) -> Vec<&'static str> {
        vec![
            "origin",
            "product",
            "level",
            "timerange",
            "reftime",
            "area",
            "proddef",
            "run",
            "task",
            "quantity",
        ]
    }

    /// Parse a full match expression.
    ///
    /// An empty expression parses to the empty matcher, which matches
    /// everything.
    pub fn parse(&self, expression: &str) -> MatcherResult<Matcher> {
        let mut clauses: BTreeMap<Code, OrMatcher> = BTreeMap::new();
        for raw_clause in expression.split(|c| c == ';' || c == '\n') {
            let clause = raw_clause.trim();
            if clause.is_empty() {
                continue;
            }
            let (type_name, subexpr) = clause.split_once(':').ok_or_else(|| {
                MatcherError::parse(clause, "expected 'type:expression'")
            })?;
            let type_name = type_name.trim().to_lowercase();
            let code = Code::from_name(&type_name)
                .filter(|c| !matches!(c, Code::Note | Code::Source))
                .ok_or_else(|| MatcherError::UnknownType(type_name.clone()))?;

            let mut alternatives = Vec::new();
            for alternative in subexpr.split(" or ") {
                let alternative = alternative.trim();
                alternatives.push(self.parse_one(code, alternative)?);
            }
            clauses.insert(code, OrMatcher { alternatives });
        }
        Ok(Matcher { clauses })
    }

    fn parse_one(&self, code: Code, pattern: &str) -> MatcherResult<AttrMatcher> {
        Ok(match code {
            Code::Origin => AttrMatcher::Origin(MatchOrigin::parse(pattern)?),
            Code::Product => AttrMatcher::Product(MatchProduct::parse(pattern)?),
            Code::Level => AttrMatcher::Level(MatchLevel::parse(pattern)?),
            Code::Timerange => AttrMatcher::Timerange(MatchTimerange::parse(pattern)?),
            Code::Reftime => AttrMatcher::Reftime(MatchReftime::parse(pattern)?),
            Code::Area => AttrMatcher::Area(MatchArea::parse(pattern, self.geometry.as_ref())?),
            Code::Proddef => AttrMatcher::Proddef(MatchProddef::parse(pattern)?),
            Code::Run => AttrMatcher::Run(MatchRun::parse(pattern)?),
            Code::Task => AttrMatcher::Task(MatchTask::parse(pattern)?),
            Code::Quantity => AttrMatcher::Quantity(MatchQuantity::parse(pattern)?),
            Code::Note | Code::Source => unreachable!("rejected during clause parsing"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Origin;
    use chrono::NaiveDate;

    fn sample_metadata() -> Metadata {
        let mut md = Metadata::new();
        md.set(Attribute::Origin(Origin::Grib1 {
            centre: 98,
            subcentre: 0,
            process: 12,
        }));
        md.set(Attribute::Reftime(
            NaiveDate::from_ymd_opt(2007, 4, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        ));
        md.set(Attribute::Task(String::from("task1")));
        md
    }

    #[test]
    fn test_conjunction() {
        let parser = Parser::new();
        let m = parser
            .parse("origin:GRIB1,98; reftime:>=2007-04-01,<=2007-05-10")
            .unwrap();
        assert!(m.matches(&sample_metadata()));

        let m = parser
            .parse("origin:GRIB1,98; reftime:>=2008-01-01")
            .unwrap();
        assert!(!m.matches(&sample_metadata()));
    }

    #[test]
    fn test_absent_type_fails_match() {
        let parser = Parser::new();
        let m = parser.parse("quantity:B13011").unwrap();
        assert!(!m.matches(&sample_metadata()));
    }

    #[test]
    fn test_or_alternatives() {
        let parser = Parser::new();
        let m = parser.parse("origin:GRIB1,200 or GRIB1,98").unwrap();
        assert!(m.matches(&sample_metadata()));
    }

    #[test]
    fn test_empty_matcher_matches_everything() {
        let parser = Parser::new();
        let m = parser.parse("").unwrap();
        assert!(m.is_empty());
        assert!(m.matches(&sample_metadata()));
        assert!(m.matches(&Metadata::new()));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let parser = Parser::new();
        match parser.parse("frobnicator:yes") {
            Err(MatcherError::UnknownType(name)) => assert_eq!(name, "frobnicator"),
            other => panic!("unexpected result: {:?}", other.map(|m| m.to_string())),
        }
    }

    #[test]
    fn test_task_substring_clause() {
        let parser = Parser::new();
        assert!(parser.parse("task:task1").unwrap().matches(&sample_metadata()));
        assert!(parser.parse("task:ASK").unwrap().matches(&sample_metadata()));
        assert!(!parser.parse("task:baaaaa").unwrap().matches(&sample_metadata()));
    }

    #[test]
    fn test_display_reparses() {
        let parser = Parser::new();
        let m = parser
            .parse("origin:GRIB1,98 or GRIB1,200; task:TASK1")
            .unwrap();
        let again = parser.parse(&m.to_string()).unwrap();
        assert!(again.matches(&sample_metadata()));
        assert_eq!(m.to_string(), again.to_string());
    }

    #[test]
    fn test_reftime_extremes_union_over_or() {
        let parser = Parser::new();
        let m = parser
            .parse("reftime:=2007-04 or =2007-06")
            .unwrap();
        let (lower, upper) = m.reftime_extremes();
        assert_eq!(
            lower.unwrap(),
            NaiveDate::from_ymd_opt(2007, 4, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert_eq!(
            upper.unwrap(),
            NaiveDate::from_ymd_opt(2007, 6, 30)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap()
        );
    }
}
