use crate::{BuildConfig, SearchIndex};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_news: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
    pub config: BuildConfig,
}

impl MetaFile {
    pub fn for_index(index: &SearchIndex) -> Self {
        Self {
            num_docs: index.num_docs() as u32,
            num_news: index.num_news() as u32,
            num_terms: index.dictionary().len() as u32,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: FORMAT_VERSION,
            config: *index.config(),
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

pub fn save_index(paths: &IndexPaths, index: &SearchIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let f = File::create(paths.index()).with_context(|| format!("creating {}", paths.index().display()))?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, index)?;
    w.flush()?;
    Ok(())
}

pub fn load_index(paths: &IndexPaths) -> Result<SearchIndex> {
    let f = File::open(paths.index()).with_context(|| format!("opening {}", paths.index().display()))?;
    let index = bincode::deserialize_from(BufReader::new(f))?;
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Write the index and its meta file side by side.
pub fn save_all(paths: &IndexPaths, index: &SearchIndex) -> Result<MetaFile> {
    save_index(paths, index)?;
    let meta = MetaFile::for_index(index);
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_news = meta.num_news, "index saved");
    Ok(meta)
}

/// Load an index, refusing one written by a different format version.
pub fn load_all(paths: &IndexPaths) -> Result<(SearchIndex, MetaFile)> {
    let meta = load_meta(paths)?;
    anyhow::ensure!(
        meta.version == FORMAT_VERSION,
        "index format version {} is not supported (expected {FORMAT_VERSION})",
        meta.version
    );
    let index = load_index(paths)?;
    Ok((index, meta))
}
