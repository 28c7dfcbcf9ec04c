//! The query pipeline: candidate recall, scoring, ranking.
//!
//! Recall comes from the two inverted indexes; precision comes from
//! re-scoring candidate names. Stages, in order:
//!
//! 1. trim the query; empty queries return nothing
//! 2. trigram lookup (skipped below `min_trigram_length`), candidates kept
//!    when their name scores above zero
//! 3. token lookup when CamelCase matching is enabled; token hits carry a
//!    +100 boost
//! 4. abbreviation enumeration over all items, admitting unseen items at a
//!    flat 600
//!
//! Results merge per item keeping the best score, sort by score descending
//! with shorter names winning ties, and truncate to the limit.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::store::{Item, ItemId, ItemKind, ItemStore};
use crate::text::score::{SCORE_ABBREV_FALLBACK, TOKEN_HIT_BOOST};
use crate::text::{abbrev_matches, query_trigrams, score, split_words};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: ItemId,
    pub path: String,
    pub name: String,
    pub kind: ItemKind,
    pub score: i32,
    pub container: Option<String>,
}

impl SearchHit {
    fn from_item(item: Item, score: i32) -> Self {
        let container = item.container().map(str::to_string);
        Self {
            id: item.id,
            path: item.path,
            name: item.name,
            kind: item.kind,
            score,
            container,
        }
    }
}

/// Stateless view over a store + configuration pair.
pub struct QueryEngine<'a> {
    store: &'a dyn ItemStore,
    config: &'a SearchConfig,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a dyn ItemStore, config: &'a SearchConfig) -> Self {
        Self { store, config }
    }

    /// Run the full pipeline. "No results" is an `Ok(vec![])`, never an
    /// error.
    pub fn search(&self, raw_query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let query = raw_query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let case_sensitive = self.config.case_sensitive;
        let mut merged: HashMap<ItemId, SearchHit> = HashMap::new();

        // Trigram recall.
        if query.chars().count() >= self.config.min_trigram_length {
            let terms = query_trigrams(query, case_sensitive);
            if !terms.is_empty() {
                let counts = self.store.search_trigrams(&terms)?;
                for (&id, _count) in counts.iter() {
                    if merged.contains_key(&id) {
                        continue;
                    }
                    if let Some(item) = self.store.get_item(id)? {
                        let s = score(query, &item.name, case_sensitive);
                        if s > 0 {
                            merged.insert(id, SearchHit::from_item(item, s));
                        }
                    }
                }
            }
        }

        // Token recall.
        if self.config.enable_camelcase {
            let tokens: Vec<String> = split_words(query)
                .into_iter()
                .map(|t| {
                    if case_sensitive {
                        t.text
                    } else {
                        t.text.to_lowercase()
                    }
                })
                .collect();
            if !tokens.is_empty() {
                let counts = self.store.search_tokens(&tokens)?;
                for (&id, _count) in counts.iter() {
                    let hit = match merged.get(&id) {
                        Some(existing) => {
                            let s = score(query, &existing.name, case_sensitive);
                            (s > 0).then_some((None, s + TOKEN_HIT_BOOST))
                        }
                        None => match self.store.get_item(id)? {
                            Some(item) => {
                                let s = score(query, &item.name, case_sensitive);
                                (s > 0).then_some((Some(item), s + TOKEN_HIT_BOOST))
                            }
                            None => None,
                        },
                    };
                    if let Some((item, boosted)) = hit {
                        merge(&mut merged, id, item, boosted);
                    }
                }
            }
        }

        // Abbreviation fallback over the whole item table.
        for item in self.store.all_items()? {
            if merged.contains_key(&item.id) {
                continue;
            }
            if abbrev_matches(query, &item.name) {
                merged.insert(item.id, SearchHit::from_item(item, SCORE_ABBREV_FALLBACK));
            }
        }

        let mut hits: Vec<SearchHit> = merged
            .into_values()
            .filter(|hit| {
                if hit.kind.is_file() {
                    self.config.include_files
                } else {
                    self.config.include_symbols
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.name.len().cmp(&b.name.len()))
                .then_with(|| a.name.cmp(&b.name))
        });
        hits.truncate(limit.min(self.config.max_results));
        Ok(hits)
    }
}

fn merge(merged: &mut HashMap<ItemId, SearchHit>, id: ItemId, item: Option<Item>, score: i32) {
    match merged.entry(id) {
        Entry::Occupied(mut entry) => {
            if score > entry.get().score {
                entry.get_mut().score = score;
            }
        }
        Entry::Vacant(entry) => {
            if let Some(item) = item {
                entry.insert(SearchHit::from_item(item, score));
            }
        }
    }
}
