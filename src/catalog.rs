//! The catalog is the list of models a router can route to. It is fetched from
//! a [`CatalogSource`] and always presented in ranked order (see [`ranking`]).
//!
//! Every model is addressed by a *model spec*. In BNF:
//! ```text
//! <model spec> := <model name> | <provider name> "/" <model name>
//! ```
//!
//! The router itself only accepts qualified specs. A bare model name is resolved
//! to the first qualified identifier in ranked order which serves it, so that a
//! user can ask for `gpt-4o` without knowing which provider exposes it.

pub(crate) mod ranking;

use std::collections::BTreeMap;
use thiserror::Error;

use crate::router::{self, CatalogSource};
use ranking::ModelRanker;

#[derive(Error, Debug)]
pub(crate) enum Error {
    /// No provider serves the model
    #[error("model \"{0}\" is not served by the router")]
    ModelNotFound(String),
    /// The catalog is empty and no default model is configured
    #[error("the router lists no models and no default model is configured")]
    DefaultModelUnset,
    /// Failed to list the models served by the router
    #[error("failed to obtain the model catalog: {0}")]
    ListingFailed(#[source] router::Error),
}

/// A model as listed by the router: the provider which serves it and the
/// provider's own name for it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub(crate) struct CatalogEntry {
    pub provider_name: String,
    pub name: String,
}

impl CatalogEntry {
    pub(crate) fn new(provider_name: impl Into<String>, name: impl Into<String>) -> CatalogEntry {
        CatalogEntry {
            provider_name: provider_name.into(),
            name: name.into(),
        }
    }

    /// The `provider/name` identifier accepted by the router. Provider names
    /// are matched case-insensitively by the router and listed in lowercase.
    pub(crate) fn qualified_id(&self) -> String {
        if self.provider_name.is_empty() {
            return self.name.clone();
        }

        format!("{}/{}", self.provider_name.to_lowercase(), self.name)
    }
}

/// Builds the qualified identifiers of `entries` in ranked order. Duplicates
/// are listed once.
pub(crate) fn ranked_ids(ranker: &ModelRanker, entries: &[CatalogEntry]) -> Vec<String> {
    let mut ids: Vec<String> = entries.iter().map(|e| e.qualified_id()).collect();

    ids.sort_by(|a, b| ranker.compare(a, b));
    ids.dedup();

    ids
}

pub(crate) struct Catalog {
    entries: Vec<CatalogEntry>,
    ranked: Vec<String>,
}

impl Catalog {
    pub(crate) fn new(ranker: &ModelRanker, mut entries: Vec<CatalogEntry>) -> Catalog {
        let ranked = ranked_ids(ranker, &entries);

        entries.sort_by(|a, b| ranker.compare(&a.qualified_id(), &b.qualified_id()));
        entries.dedup();

        Catalog { entries, ranked }
    }

    pub(crate) async fn fetch<S: CatalogSource + ?Sized>(
        source: &S,
        ranker: &ModelRanker,
    ) -> Result<Catalog, Error> {
        let entries = source.catalog().await.map_err(Error::ListingFailed)?;

        Ok(Catalog::new(ranker, entries))
    }

    /// Entries in ranked order.
    pub(crate) fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Qualified identifiers in ranked order.
    pub(crate) fn ids(&self) -> &[String] {
        &self.ranked
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Entries served by `provider` (matched case-insensitively), in ranked order.
    pub(crate) fn by_provider<'c>(
        &'c self,
        provider: &'c str,
    ) -> impl Iterator<Item = &'c CatalogEntry> + 'c {
        self.entries
            .iter()
            .filter(move |e| e.provider_name.eq_ignore_ascii_case(provider))
    }

    /// Number of models listed per provider, keyed by the provider's lowercase
    /// name.
    pub(crate) fn provider_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();

        for entry in &self.entries {
            *counts.entry(entry.provider_name.to_lowercase()).or_insert(0) += 1;
        }

        counts
    }

    /// Resolves a model spec to a qualified identifier. `None` resolves to the
    /// `default` spec if one is given, otherwise to the top-ranked model.
    pub(crate) fn resolve(&self, spec: Option<&str>, default: Option<&str>) -> Result<String, Error> {
        let spec = match spec.or(default) {
            Some(spec) => spec.trim(),
            None => {
                return self
                    .ranked
                    .first()
                    .cloned()
                    .ok_or(Error::DefaultModelUnset)
            }
        };

        match spec.split_once('/') {
            Some((provider, name)) => self
                .entries
                .iter()
                .find(|e| e.provider_name.eq_ignore_ascii_case(provider.trim()) && e.name == name.trim())
                .map(|e| e.qualified_id())
                .ok_or_else(|| Error::ModelNotFound(spec.to_string())),
            None => self
                .entries
                .iter()
                .find(|e| e.name == spec)
                .map(|e| e.qualified_id())
                .ok_or_else(|| Error::ModelNotFound(spec.to_string())),
        }
    }
}
