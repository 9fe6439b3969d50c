use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::index::{NewsId, PostingList, SearchIndex};
use crate::query::QueryNode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub news_id: NewsId,
    /// Present only when the hits were ranked.
    pub score: Option<f32>,
}

/// Order `results` by descending term-frequency score, ties by ascending news id.
///
/// Each distinct positive literal of `query` adds `1 + ln(tf)` for every item it occurs in.
/// Membership never changes.
pub fn rank(index: &SearchIndex, query: &QueryNode, results: &[NewsId]) -> Vec<Hit> {
    let mut terms: Vec<_> = query
        .positive_terms()
        .into_iter()
        .map(|(field, term)| (index.target_field(field), term))
        .collect();
    terms.sort_unstable();
    terms.dedup();
    let lists: Vec<&PostingList> = terms.iter().filter_map(|&(field, term)| index.postings(field, term)).collect();

    let mut hits: Vec<Hit> = results
        .iter()
        .map(|&news_id| {
            let score = lists
                .iter()
                .filter_map(|l| l.get(news_id))
                .map(|p| 1.0 + (p.freq as f32).ln())
                .sum::<f32>();
            Hit { news_id, score: Some(score) }
        })
        .collect();
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.news_id.cmp(&b.news_id))
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{BuildConfig, IndexBuilder, NewsItem};
    use crate::search::QueryOptions;

    #[test]
    fn frequent_terms_rank_first_ties_by_id() {
        let mut b = IndexBuilder::new(BuildConfig::default());
        let doc = b.add_document("x.json");
        for a in ["liga", "liga liga liga", "liga madrid", "liga"] {
            b.add_news(doc, &NewsItem { article: a.into(), ..Default::default() });
        }
        let idx = b.finish();
        let opts = QueryOptions { ranking: true, ..Default::default() };
        let hits = idx.search("liga OR madrid", &opts).unwrap();
        let order: Vec<NewsId> = hits.iter().map(|h| h.news_id).collect();
        // 1 + ln 3 > 1 + 1 > 1
        assert_eq!(order, vec![1, 2, 0, 3]);
    }

    #[test]
    fn negated_terms_do_not_score() {
        let mut b = IndexBuilder::new(BuildConfig::default());
        let doc = b.add_document("x.json");
        for a in ["copa", "copa copa copa liga"] {
            b.add_news(doc, &NewsItem { article: a.into(), ..Default::default() });
        }
        let idx = b.finish();
        let node = crate::query::parse("NOT liga OR copa").unwrap();
        let hits = rank(&idx, &node, &[0, 1]);
        assert_eq!(hits[0].news_id, 1);
        assert_eq!(hits[1].score, Some(1.0));
    }
}
