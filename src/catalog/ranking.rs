//! Display ordering for model identifiers.
//!
//! Catalogs mix providers, families and dated snapshots. The ordering puts the
//! newest generation of a recognized family first, keeps a family's bare base
//! model ahead of its dated or suffixed variants, and sinks fine-tunes (`ft:`)
//! to the bottom. It is a total order, so sorting is deterministic and
//! idempotent regardless of the input order.
//!
//! Family recognition is heuristic. A family is `<base>-<generation>` where the
//! base is one of a configured set of names (by default only `gpt`) and the
//! generation is numeric (`4`, `3.5`), optionally followed by an attached
//! lowercase suffix (`4o`) and a single alphabetic qualifier (`-turbo`).
//! Anything after that is the version (`0613`, `2024-04-09`, `1106-preview`).
//! Identifiers which do not follow the scheme rank lowest and are ordered by
//! name.

use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;

const FINE_TUNE_MARKER: &str = "ft:";

lazy_static! {
    static ref DEFAULT_RANKER: ModelRanker = ModelRanker::new(&["gpt"]);
}

/// The parsed form of an identifier.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedModelId<'a> {
    /// The identifier with any `provider/` prefix removed.
    pub unqualified: &'a str,
    pub fine_tuned: bool,
    pub family: &'a str,
    pub version: &'a str,
    /// The numeric generation of the family, zero for families outside the
    /// recognized scheme.
    pub rank: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct ModelRanker {
    // None when no family is recognized
    pattern: Option<Regex>,
}

impl Default for ModelRanker {
    fn default() -> Self {
        DEFAULT_RANKER.clone()
    }
}

impl ModelRanker {
    /// Builds a ranker recognizing the given family base names. Bases are
    /// matched literally and case-insensitively.
    pub(crate) fn new<S: AsRef<str>>(families: &[S]) -> ModelRanker {
        let bases: Vec<String> = families
            .iter()
            .map(|f| f.as_ref().trim())
            .filter(|f| !f.is_empty())
            .map(regex::escape)
            .collect();

        if bases.is_empty() {
            return ModelRanker { pattern: None };
        }

        let pattern = format!(
            r"(?i)^((?:{})-(\d+(?:\.\d+)?)[a-z]*(?:-[a-z]+)?)(?:-(.+))?$",
            bases.join("|")
        );

        ModelRanker {
            pattern: Some(
                Regex::new(&pattern).expect("family pattern is built from escaped literals"),
            ),
        }
    }

    /// Extracts the family, version and rank of an identifier. Never fails:
    /// identifiers outside the scheme are their own family.
    pub(crate) fn parse<'a>(&self, id: &'a str) -> ParsedModelId<'a> {
        let unqualified = unqualified(id);

        let (fine_tuned, base) = match unqualified.strip_prefix(FINE_TUNE_MARKER) {
            Some(rest) => (true, rest),
            None => (false, unqualified),
        };

        let captures = self.pattern.as_ref().and_then(|p| p.captures(base));

        let (family, version, rank) = match captures {
            Some(caps) => {
                let family = caps.get(1).map_or(base, |m| m.as_str());
                let version = caps.get(3).map_or("", |m| m.as_str());
                let generation = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .unwrap_or(0.0);

                (family, version, generation)
            }
            None => (base, "", 0.0),
        };

        ParsedModelId {
            unqualified,
            fine_tuned,
            family,
            version,
            rank,
        }
    }

    /// Compares two identifiers for display. `Less` means `a` is listed first.
    pub(crate) fn compare(&self, a: &str, b: &str) -> Ordering {
        let pa = self.parse(a);
        let pb = self.parse(b);

        pa.fine_tuned
            .cmp(&pb.fine_tuned)
            .then_with(|| pb.rank.total_cmp(&pa.rank))
            .then_with(|| pa.family.cmp(pb.family))
            .then_with(|| pa.unqualified.len().cmp(&pb.unqualified.len()))
            .then_with(|| a.cmp(b))
    }

    /// Returns a sorted copy of `ids`.
    pub(crate) fn sorted<S: AsRef<str>>(&self, ids: &[S]) -> Vec<String> {
        let mut sorted: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();

        sorted.sort_by(|a, b| self.compare(a, b));

        sorted
    }
}

/// Strips a `provider/` namespace. Only the first slash separates the provider.
pub(crate) fn unqualified(id: &str) -> &str {
    id.split_once('/').map_or(id, |(_, raw)| raw)
}
