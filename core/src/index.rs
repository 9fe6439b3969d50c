use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::expansion::{PermutermIndex, StemIndex};
use crate::tokenizer::{normalize_keyword, tokenize};

pub type TermId = u32;
pub type DocId = u32;
pub type NewsId = u32;
/// 1-based token ordinal within a field's text.
pub type Position = u32;
/// Ascending, duplicate-free news ids. Every query operator consumes and produces one.
pub type ResultSet = Vec<NewsId>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Date,
    Keywords,
    Article,
    Summary,
}

impl Field {
    pub const ALL: [Field; 5] = [Field::Title, Field::Date, Field::Keywords, Field::Article, Field::Summary];
    /// Field used by literals without a `field:` qualifier.
    pub const DEFAULT: Field = Field::Article;

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Date => "date",
            Field::Keywords => "keywords",
            Field::Article => "article",
            Field::Summary => "summary",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Dates are indexed whole, everything else goes through the tokenizer.
    pub fn is_tokenized(self) -> bool {
        !matches!(self, Field::Date)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One news article as handed over by the ingestion side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub keywords: String,
    pub article: String,
    #[serde(default)]
    pub summary: String,
}

impl NewsItem {
    pub fn text(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Date => &self.date,
            Field::Keywords => &self.keywords,
            Field::Article => &self.article,
            Field::Summary => &self.summary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMeta {
    /// Opaque origin key (a file path for the indexer), never read by the index itself.
    pub origin: String,
    pub num_news: u32,
}

/// Where a news item lives: its document and its ordinal inside that document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRef {
    pub doc_id: DocId,
    pub ordinal: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub freq: u32,
    /// Strictly increasing. Emptied after the build when positions are not retained.
    pub positions: Vec<Position>,
}

/// Postings of one term in one field, sorted by news id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostingList {
    news: Vec<NewsId>,
    postings: Vec<Posting>,
}

impl PostingList {
    pub fn news_ids(&self) -> &[NewsId] {
        &self.news
    }

    pub fn len(&self) -> usize {
        self.news.len()
    }

    pub fn is_empty(&self) -> bool {
        self.news.is_empty()
    }

    pub fn get(&self, news_id: NewsId) -> Option<&Posting> {
        self.news.binary_search(&news_id).ok().map(|i| &self.postings[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NewsId, &Posting)> {
        self.news.iter().copied().zip(self.postings.iter())
    }

    fn record(&mut self, news_id: NewsId, position: Position) {
        // News ids arrive in increasing order, so the common case touches the tail only.
        match self.news.last() {
            Some(&last) if last == news_id => {
                let p = self.postings.last_mut().expect("parallel vectors");
                p.freq += 1;
                p.positions.push(position);
            }
            Some(&last) if last > news_id => {
                let i = self.news.partition_point(|&n| n < news_id);
                if self.news.get(i) == Some(&news_id) {
                    let p = &mut self.postings[i];
                    p.freq += 1;
                    p.positions.push(position);
                } else {
                    self.news.insert(i, news_id);
                    self.postings.insert(i, Posting { freq: 1, positions: vec![position] });
                }
            }
            _ => {
                self.news.push(news_id);
                self.postings.push(Posting { freq: 1, positions: vec![position] });
            }
        }
    }

    fn drop_positions(&mut self) {
        for p in &mut self.postings {
            p.positions = Vec::new();
        }
    }
}

/// Interned term strings shared by every field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dictionary {
    terms: Vec<String>,
    ids: HashMap<String, TermId>,
}

impl Dictionary {
    pub fn get(&self, term: &str) -> Option<TermId> {
        self.ids.get(term).copied()
    }

    pub fn term(&self, id: TermId) -> &str {
        &self.terms[id as usize]
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    fn intern(&mut self, term: String) -> TermId {
        if let Some(&id) = self.ids.get(&term) {
            return id;
        }
        let id = self.terms.len() as TermId;
        self.terms.push(term.clone());
        self.ids.insert(term, id);
        id
    }
}

/// Inverted index of a single field: term -> postings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldIndex {
    postings: HashMap<TermId, PostingList>,
}

impl FieldIndex {
    pub fn postings(&self, term: TermId) -> Option<&PostingList> {
        self.postings.get(&term)
    }

    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }
}

/// Options fixed for the lifetime of a built index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// One inverted index per field instead of a single flattened one.
    pub multifield: bool,
    /// Keep position lists so phrase queries can be answered.
    pub positional: bool,
    pub stemming: bool,
    pub permuterm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub num_docs: usize,
    pub num_news: usize,
    pub num_terms: usize,
    pub terms_per_field: BTreeMap<Field, usize>,
    pub permuterm_rotations: Option<usize>,
    pub stem_classes: Option<usize>,
}

/// Single writer for the build phase. `finish` freezes it into a [`SearchIndex`].
#[derive(Debug)]
pub struct IndexBuilder {
    config: BuildConfig,
    dictionary: Dictionary,
    fields: BTreeMap<Field, FieldIndex>,
    docs: Vec<DocMeta>,
    news: Vec<NewsRef>,
    // last flattened position written per news item in single-field mode
    flat_cursor: Option<(NewsId, Position)>,
}

impl IndexBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            dictionary: Dictionary::default(),
            fields: BTreeMap::new(),
            docs: Vec::new(),
            news: Vec::new(),
            flat_cursor: None,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn num_news(&self) -> usize {
        self.news.len()
    }

    /// Register a document and return its id. News items are attached with [`Self::add_news`].
    pub fn add_document(&mut self, origin: impl Into<String>) -> DocId {
        let doc_id = self.docs.len() as DocId;
        self.docs.push(DocMeta { origin: origin.into(), num_news: 0 });
        doc_id
    }

    /// Assign the next news id to `item`, record its place in `doc_id` and index its fields.
    ///
    /// # Panics
    /// If `doc_id` was not returned by [`Self::add_document`].
    pub fn add_news(&mut self, doc_id: DocId, item: &NewsItem) -> NewsId {
        let doc = &mut self.docs[doc_id as usize];
        let news_id = self.news.len() as NewsId;
        self.news.push(NewsRef { doc_id, ordinal: doc.num_news });
        doc.num_news += 1;
        for field in Field::ALL {
            self.ingest(news_id, field, item.text(field));
        }
        news_id
    }

    /// Index `text` as the content of `field` for `news_id`.
    ///
    /// In single-field mode every tokenized field lands in the default field and positions
    /// keep counting from where the previous field of the same item stopped; dates are skipped.
    /// Not idempotent: ingesting the same field twice duplicates its postings.
    pub fn ingest(&mut self, news_id: NewsId, field: Field, text: &str) {
        assert!((news_id as usize) < self.news.len(), "news id {news_id} was never registered");

        let tokens = if field.is_tokenized() {
            tokenize(text)
        } else {
            let whole = normalize_keyword(text);
            if whole.is_empty() { Vec::new() } else { vec![whole] }
        };
        if tokens.is_empty() {
            return;
        }

        let (target, start) = if self.config.multifield {
            (field, 0)
        } else if !field.is_tokenized() {
            return;
        } else {
            let start = match self.flat_cursor {
                Some((id, last)) if id == news_id => last,
                _ => 0,
            };
            (Field::DEFAULT, start)
        };

        let index = self.fields.entry(target).or_default();
        let mut position = start;
        for token in tokens {
            position += 1;
            let term_id = self.dictionary.intern(token);
            index.postings.entry(term_id).or_default().record(news_id, position);
        }
        if !self.config.multifield {
            self.flat_cursor = Some((news_id, position));
        }
    }

    /// Freeze the primary index and build the derived structures the config asks for.
    pub fn finish(mut self) -> SearchIndex {
        if !self.config.positional {
            for index in self.fields.values_mut() {
                index.postings.values_mut().for_each(PostingList::drop_positions);
            }
        }
        tracing::info!(
            num_docs = self.docs.len(),
            num_news = self.news.len(),
            num_terms = self.dictionary.len(),
            "primary index frozen"
        );

        let stems = self.config.stemming.then(|| StemIndex::build(&self.dictionary));
        let permuterm = self.config.permuterm.then(|| PermutermIndex::build(&self.dictionary));
        if let Some(s) = &stems {
            tracing::info!(classes = s.len(), "stem index built");
        }
        if let Some(p) = &permuterm {
            tracing::info!(rotations = p.len(), "permuterm index built");
        }

        SearchIndex {
            config: self.config,
            dictionary: self.dictionary,
            fields: self.fields,
            docs: self.docs,
            news: self.news,
            stems,
            permuterm,
        }
    }
}

/// Frozen index: primary postings plus derived expansion structures. Read-only, so it
/// can be shared across threads answering queries concurrently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndex {
    config: BuildConfig,
    dictionary: Dictionary,
    fields: BTreeMap<Field, FieldIndex>,
    docs: Vec<DocMeta>,
    news: Vec<NewsRef>,
    stems: Option<StemIndex>,
    permuterm: Option<PermutermIndex>,
}

impl SearchIndex {
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn num_news(&self) -> usize {
        self.news.len()
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&DocMeta> {
        self.docs.get(doc_id as usize)
    }

    /// Display accessor: document and ordinal of a news item.
    pub fn lookup(&self, news_id: NewsId) -> Option<NewsRef> {
        self.news.get(news_id as usize).copied()
    }

    /// Field that actually holds the postings for a literal aimed at `field`.
    pub fn target_field(&self, field: Option<Field>) -> Field {
        match field {
            Some(f) if self.config.multifield => f,
            _ => Field::DEFAULT,
        }
    }

    pub fn field(&self, field: Field) -> Option<&FieldIndex> {
        self.fields.get(&field)
    }

    pub fn postings(&self, field: Field, term: &str) -> Option<&PostingList> {
        let id = self.dictionary.get(term)?;
        self.postings_by_id(field, id)
    }

    pub fn postings_by_id(&self, field: Field, term: TermId) -> Option<&PostingList> {
        self.fields.get(&field)?.postings(term)
    }

    /// Literal term lookup. An unknown term is an empty result, not an error.
    pub fn term_postings(&self, field: Field, term: &str) -> ResultSet {
        self.postings(field, term).map(|p| p.news_ids().to_vec()).unwrap_or_default()
    }

    /// # Panics
    /// If the index was built without stemming.
    pub fn stems(&self) -> &StemIndex {
        self.stems.as_ref().expect("stem index requested but the index was built without stemming")
    }

    /// # Panics
    /// If the index was built without permuterm.
    pub fn permuterm(&self) -> &PermutermIndex {
        self.permuterm.as_ref().expect("permuterm index requested but the index was built without permuterm")
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            num_docs: self.docs.len(),
            num_news: self.news.len(),
            num_terms: self.dictionary.len(),
            terms_per_field: self.fields.iter().map(|(f, idx)| (*f, idx.num_terms())).collect(),
            permuterm_rotations: self.permuterm.as_ref().map(PermutermIndex::len),
            stem_classes: self.stems.as_ref().map(StemIndex::len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(article: &str) -> NewsItem {
        NewsItem { article: article.into(), ..Default::default() }
    }

    #[test]
    fn positions_are_one_based_and_ordered() {
        let mut b = IndexBuilder::new(BuildConfig { positional: true, ..Default::default() });
        let doc = b.add_document("a.json");
        let n = b.add_news(doc, &item("la casa y la calle"));
        let index = b.finish();
        let la = index.postings(Field::Article, "la").unwrap();
        assert_eq!(la.news_ids(), &[n]);
        assert_eq!(la.get(n).unwrap().positions, vec![1, 4]);
        assert_eq!(la.get(n).unwrap().freq, 2);
    }

    #[test]
    fn single_field_mode_flattens_with_running_positions() {
        let mut b = IndexBuilder::new(BuildConfig { positional: true, ..Default::default() });
        let doc = b.add_document("a.json");
        let n = b.add_news(
            doc,
            &NewsItem { title: "Titular".into(), date: "2020-01-01".into(), article: "cuerpo".into(), ..Default::default() },
        );
        let index = b.finish();
        assert_eq!(index.postings(Field::Article, "titular").unwrap().get(n).unwrap().positions, vec![1]);
        assert_eq!(index.postings(Field::Article, "cuerpo").unwrap().get(n).unwrap().positions, vec![2]);
        assert!(index.field(Field::Title).is_none());
        assert!(index.dictionary().get("2020-01-01").is_none());
    }

    #[test]
    fn multifield_keeps_fields_apart_and_dates_whole() {
        let mut b = IndexBuilder::new(BuildConfig { multifield: true, ..Default::default() });
        let doc = b.add_document("a.json");
        let n = b.add_news(
            doc,
            &NewsItem { title: "Madrid".into(), date: "2020-01-01".into(), article: "liga".into(), ..Default::default() },
        );
        let index = b.finish();
        assert_eq!(index.term_postings(Field::Title, "madrid"), vec![n]);
        assert!(index.term_postings(Field::Article, "madrid").is_empty());
        assert_eq!(index.term_postings(Field::Date, "2020-01-01"), vec![n]);
    }

    #[test]
    fn lookup_reports_document_and_ordinal() {
        let mut b = IndexBuilder::new(BuildConfig::default());
        let d0 = b.add_document("a.json");
        b.add_news(d0, &item("uno"));
        let d1 = b.add_document("b.json");
        b.add_news(d1, &item("dos"));
        let third = b.add_news(d1, &item("tres"));
        let index = b.finish();
        assert_eq!(index.lookup(third), Some(NewsRef { doc_id: d1, ordinal: 1 }));
        assert_eq!(index.doc(d1).unwrap().num_news, 2);
        assert_eq!(index.lookup(99), None);
    }

    #[test]
    fn positions_dropped_when_not_positional() {
        let mut b = IndexBuilder::new(BuildConfig::default());
        let doc = b.add_document("a.json");
        let n = b.add_news(doc, &item("eco eco eco"));
        let index = b.finish();
        let p = index.postings(Field::Article, "eco").unwrap().get(n).unwrap();
        assert_eq!(p.freq, 3);
        assert!(p.positions.is_empty());
    }
}
