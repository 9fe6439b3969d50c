//! Reading news collections from disk and rendering text windows for display.
//!
//! A news file is a JSON array of objects with `title`, `date`, `keywords`, `article` and
//! `summary`. Only `article` is required.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::index::{DocId, IndexBuilder, NewsId, NewsItem, SearchIndex};
use crate::tokenizer::token_offsets;

/// Every record of a news file, each parsed on its own so one bad record does not sink the file.
pub fn read_news_file(path: &Path) -> Result<Vec<serde_json::Result<NewsItem>>> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let json: Value = serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing {}", path.display()))?;
    let records = match json {
        Value::Array(arr) => arr,
        obj @ Value::Object(_) => vec![obj],
        _ => bail!("{} is not a JSON array of news", path.display()),
    };
    Ok(records.into_iter().map(serde_json::from_value).collect())
}

/// The well-formed news items of a file, positioned by their ingestion ordinal.
pub fn read_news_items(path: &Path) -> Result<Vec<NewsItem>> {
    Ok(read_news_file(path)?.into_iter().filter_map(|r| r.ok()).collect())
}

/// The `ordinal`-th well-formed news item of a file, as numbered at ingestion.
pub fn read_news_item(path: &Path, ordinal: u32) -> Result<NewsItem> {
    read_news_items(path)?
        .into_iter()
        .nth(ordinal as usize)
        .with_context(|| format!("{} has no news item #{ordinal}", path.display()))
}

/// Display items for a batch of hits. Each origin file is read once however many of its news
/// items are requested; unreadable files and unknown ids are logged and left out.
pub fn load_news_items(index: &SearchIndex, news_ids: &[NewsId]) -> HashMap<NewsId, NewsItem> {
    let mut by_doc: BTreeMap<DocId, Vec<(NewsId, u32)>> = BTreeMap::new();
    for &news_id in news_ids {
        if let Some(at) = index.lookup(news_id) {
            by_doc.entry(at.doc_id).or_default().push((news_id, at.ordinal));
        }
    }

    let mut items = HashMap::with_capacity(news_ids.len());
    for (doc_id, wanted) in by_doc {
        let Some(doc) = index.doc(doc_id) else { continue };
        let mut records = match read_news_items(Path::new(&doc.origin)) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(origin = %doc.origin, error = %e, "news file unavailable for display");
                continue;
            }
        };
        for (news_id, ordinal) in wanted {
            match records.get_mut(ordinal as usize) {
                Some(item) => {
                    items.insert(news_id, std::mem::take(item));
                }
                None => tracing::warn!(origin = %doc.origin, ordinal, "news item missing from its file"),
            }
        }
    }
    items
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub doc_id: DocId,
    pub ingested: usize,
    pub skipped: usize,
}

/// Register `path` as a document and ingest its well-formed news items. Malformed records are
/// logged and skipped.
pub fn ingest_file(builder: &mut IndexBuilder, path: &Path) -> Result<FileSummary> {
    let records = read_news_file(path)?;
    let doc_id = builder.add_document(path.to_string_lossy());
    let mut summary = FileSummary { doc_id, ..Default::default() };
    for (i, record) in records.into_iter().enumerate() {
        match record {
            Ok(item) => {
                builder.add_news(doc_id, &item);
                summary.ingested += 1;
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), record = i, error = %e, "skipping malformed news record");
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

/// About `width` characters of `text` around the first occurrence of one of `terms`
/// (normalized), or its opening if none occurs.
pub fn snippet(text: &str, terms: &[&str], width: usize) -> String {
    let hit = token_offsets(text)
        .find(|(_, tok)| terms.contains(&tok.as_str()))
        .map(|(at, _)| at)
        .unwrap_or(0);

    let lead = width / 3;
    let before: Vec<usize> = text[..hit].char_indices().map(|(i, _)| i).collect();
    let start = if before.len() > lead { before[before.len() - lead] } else { 0 };
    let end = text[start..].char_indices().nth(width).map(|(i, _)| start + i).unwrap_or(text.len());

    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(text[start..end].trim());
    if end < text.len() {
        out.push_str("...");
    }
    out
}
