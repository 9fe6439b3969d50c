//! Boolean retrieval over news collections.
//!
//! Build an index with [`IndexBuilder`], freeze it with [`IndexBuilder::finish`] and answer
//! `AND`/`OR`/`NOT` queries (phrases, wildcards, stemming, optional ranking) through
//! [`SearchIndex::resolve`] and friends.

pub mod corpus;
pub mod error;
pub mod expansion;
pub mod index;
pub mod persist;
pub mod postings;
pub mod query;
pub mod rank;
pub mod search;
pub mod tokenizer;

pub use error::QueryError;
pub use index::{
    BuildConfig, DocId, DocMeta, Field, IndexBuilder, IndexStats, NewsId, NewsItem, NewsRef, Posting, PostingList,
    ResultSet, SearchIndex, TermId,
};
pub use query::QueryNode;
pub use rank::Hit;
pub use search::QueryOptions;
