//! Dot-path selectors such as `customer.addresses.city` or `customer.*`.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Field(String),
    /// Everything below this point, transitively.
    Wildcard,
}

impl Segment {
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Field(name) => name,
            Segment::Wildcard => WILDCARD,
        }
    }
}

/// Parsed selector: non-empty, trimmed segments in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector {
    segments: SmallVec<[Segment; 4]>,
}

impl Selector {
    /// Split on `.`, trim each segment and drop empty ones; `"a..b"`, `".a.b"` and `"a.b."`
    /// all parse to `a.b`. Never fails: odd input just yields fewer segments.
    pub fn parse(input: &str) -> Self {
        let segments = input
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| if s == WILDCARD { Segment::Wildcard } else { Segment::Field(s.to_string()) })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] { &self.segments }

    pub fn is_empty(&self) -> bool { self.segments.is_empty() }

    pub fn len(&self) -> usize { self.segments.len() }

    pub fn has_wildcard(&self) -> bool { self.segments.contains(&Segment::Wildcard) }
}

/// Parse every selector string of a request, keeping request order.
pub fn parse_all<I, S>(selectors: I) -> Vec<Selector>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    selectors.into_iter().map(|s| Selector::parse(s.as_ref())).collect()
}

impl FromStr for Selector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Selector::parse(s)) }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(seg.as_str())?;
        }
        Ok(())
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Selector::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(input: &str) -> Vec<String> {
        Selector::parse(input).segments().iter().map(|s| s.as_str().to_string()).collect()
    }

    #[test]
    fn empty_segments_are_dropped() {
        let expected = vec!["a".to_string(), "b".to_string()];
        assert_eq!(segs("a.b"), expected);
        assert_eq!(segs("a..b"), expected);
        assert_eq!(segs(".a.b"), expected);
        assert_eq!(segs("a.b."), expected);
        assert_eq!(segs(" a . b "), expected);
        assert!(Selector::parse("").is_empty());
        assert!(Selector::parse(" . .").is_empty());
    }

    #[test]
    fn wildcard_is_kept_as_its_own_segment() {
        let sel = Selector::parse("c. * ");
        assert_eq!(sel.segments(), &[Segment::Field("c".into()), Segment::Wildcard]);
        assert!(sel.has_wildcard());
        assert_eq!(sel.to_string(), "c.*");
        // Only a whole segment is a wildcard.
        assert_eq!(Selector::parse("c*").segments(), &[Segment::Field("c*".into())]);
    }

    #[test]
    fn selectors_round_trip_through_serde_as_strings() {
        let parsed: Vec<Selector> = serde_json::from_str(r#"["a", "c..c", "c.*"]"#).unwrap();
        assert_eq!(parsed, parse_all(["a", "c.c", "c.*"]));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"["a","c.c","c.*"]"#);
    }
}
