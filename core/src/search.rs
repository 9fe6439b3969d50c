//! Query resolution: parse, check the index can answer, evaluate bottom-up.

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::expansion::WildcardPattern;
use crate::index::{Field, NewsId, PostingList, ResultSet, SearchIndex};
use crate::postings::{complement, difference, intersect, union, union_all};
use crate::query::{parse, QueryNode};
use crate::rank::{rank, Hit};

/// Per-call query settings. Passed with every query so concurrent callers can differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Resolve bare words through their stem class instead of the literal term.
    #[serde(default)]
    pub stemming: bool,
    /// Order hits by relevance instead of by news id.
    #[serde(default)]
    pub ranking: bool,
}

impl SearchIndex {
    /// Parse `query` and make sure this index has every structure it needs.
    pub fn prepare(&self, query: &str, options: &QueryOptions) -> Result<QueryNode> {
        let node = parse(query)?;
        if options.stemming && !self.config().stemming {
            return Err(QueryError::unsupported("stemming requested but the index has no stem classes"));
        }
        self.check_leaves(&node)?;
        Ok(node)
    }

    fn check_leaves(&self, node: &QueryNode) -> Result<()> {
        match node {
            QueryNode::Phrase { terms, .. } if terms.len() > 1 && !self.config().positional => {
                Err(QueryError::unsupported("phrase queries need a positional index"))
            }
            QueryNode::Wildcard { .. } if !self.config().permuterm => {
                Err(QueryError::unsupported("wildcard queries need a permuterm index"))
            }
            QueryNode::Not(child) => self.check_leaves(child),
            QueryNode::And(l, r) | QueryNode::Or(l, r) => {
                self.check_leaves(l)?;
                self.check_leaves(r)
            }
            _ => Ok(()),
        }
    }

    /// Matching news ids in ascending order.
    pub fn resolve(&self, query: &str, options: &QueryOptions) -> Result<ResultSet> {
        let node = self.prepare(query, options)?;
        let result = self.evaluate(&node, options);
        tracing::debug!(query, parsed = %node, hits = result.len(), "query resolved");
        Ok(result)
    }

    pub fn count_only(&self, query: &str, options: &QueryOptions) -> Result<(ResultSet, usize)> {
        let result = self.resolve(query, options)?;
        let count = result.len();
        Ok((result, count))
    }

    /// Resolve and, when `options.ranking` is set, order by descending score.
    pub fn search(&self, query: &str, options: &QueryOptions) -> Result<Vec<Hit>> {
        let node = self.prepare(query, options)?;
        let result = self.evaluate(&node, options);
        tracing::debug!(query, parsed = %node, hits = result.len(), ranked = options.ranking, "query searched");
        if options.ranking {
            Ok(rank(self, &node, &result))
        } else {
            Ok(result.into_iter().map(|news_id| Hit { news_id, score: None }).collect())
        }
    }

    /// Evaluate an already checked tree.
    ///
    /// # Panics
    /// If the tree needs an expansion structure the index lacks; [`Self::prepare`] rules that out.
    pub fn evaluate(&self, node: &QueryNode, options: &QueryOptions) -> ResultSet {
        match node {
            QueryNode::Term { field, term } => {
                let target = self.target_field(*field);
                if options.stemming && target != Field::Date {
                    self.stem_postings(target, term)
                } else {
                    self.term_postings(target, term)
                }
            }
            QueryNode::Phrase { field, terms } => self.phrase_postings(self.target_field(*field), terms),
            QueryNode::Wildcard { field, pattern } => self.wildcard_postings(self.target_field(*field), pattern),
            QueryNode::Not(child) => complement(&self.evaluate(child, options), self.num_news()),
            QueryNode::And(l, r) => match (l.as_ref(), r.as_ref()) {
                // x AND NOT y is a single difference, no complement of y needed
                (_, QueryNode::Not(neg)) => difference(&self.evaluate(l, options), &self.evaluate(neg, options)),
                (QueryNode::Not(neg), _) => difference(&self.evaluate(r, options), &self.evaluate(neg, options)),
                _ => intersect(&self.evaluate(l, options), &self.evaluate(r, options)),
            },
            QueryNode::Or(l, r) => union(&self.evaluate(l, options), &self.evaluate(r, options)),
        }
    }

    /// Union of the postings of every term sharing `term`'s stem.
    pub fn stem_postings(&self, field: Field, term: &str) -> ResultSet {
        let lists = self
            .stems()
            .class(term)
            .iter()
            .filter_map(|&id| self.postings_by_id(field, id))
            .map(|p| p.news_ids().to_vec());
        union_all(lists)
    }

    /// Union of the postings of every term matching a single-wildcard pattern.
    pub fn wildcard_postings(&self, field: Field, pattern: &WildcardPattern) -> ResultSet {
        let lists = self
            .permuterm()
            .lookup(pattern, self.dictionary())
            .into_iter()
            .filter_map(|id| self.postings_by_id(field, id))
            .map(|p| p.news_ids().to_vec());
        union_all(lists)
    }

    /// News items where `terms` occur at consecutive positions, in order.
    pub fn phrase_postings(&self, field: Field, terms: &[String]) -> ResultSet {
        match terms {
            [] => return Vec::new(),
            [single] => return self.term_postings(field, single),
            _ => {}
        }
        let Some(lists) = terms.iter().map(|t| self.postings(field, t)).collect::<Option<Vec<&PostingList>>>() else {
            return Vec::new();
        };

        let mut by_len: Vec<&PostingList> = lists.clone();
        by_len.sort_by_key(|l| l.len());
        let mut candidates = by_len[0].news_ids().to_vec();
        for list in &by_len[1..] {
            if candidates.is_empty() {
                break;
            }
            candidates = intersect(&candidates, list.news_ids());
        }

        candidates.retain(|&news_id| is_adjacent(&lists, news_id));
        candidates
    }
}

fn is_adjacent(lists: &[&PostingList], news_id: NewsId) -> bool {
    let Some(positions) = lists
        .iter()
        .map(|l| l.get(news_id).map(|p| p.positions.as_slice()))
        .collect::<Option<Vec<&[u32]>>>()
    else {
        return false;
    };
    positions[0].iter().any(|&start| {
        positions[1..]
            .iter()
            .zip(1u32..)
            .all(|(ps, offset)| ps.binary_search(&(start + offset)).is_ok())
    })
}
