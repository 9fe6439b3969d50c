use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use newsdex::corpus::{ingest_file, load_news_items, snippet};
use newsdex::persist::{load_all, save_all, IndexPaths};
use newsdex::query::parse;
use newsdex::{BuildConfig, IndexBuilder, QueryOptions, SearchIndex};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Results shown per query unless `--all` is given.
const SHOW_MAX: usize = 10;
const SNIPPET_WIDTH: usize = 150;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query Boolean indexes over news collections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a directory of JSON news files (or a single file)
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// One index per field instead of a single flattened one
        #[arg(long, default_value_t = false)]
        multifield: bool,
        /// Keep token positions to answer phrase queries
        #[arg(long, default_value_t = false)]
        positional: bool,
        /// Build stem classes
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// Build the permuterm index for wildcard queries
        #[arg(long, default_value_t = false)]
        permuterm: bool,
    },
    /// Print index statistics
    Stats {
        #[arg(long, default_value = "./index")]
        index: String,
    },
    /// Resolve queries against a built index
    Query(QueryArgs),
}

#[derive(Args)]
struct QueryArgs {
    #[arg(long, default_value = "./index")]
    index: String,
    /// A single query
    #[arg(short, long, conflicts_with_all = ["list", "test"])]
    query: Option<String>,
    /// File with one query per line
    #[arg(long, conflicts_with = "test")]
    list: Option<PathBuf>,
    /// File with `query<TAB>expected count` lines; fails on any mismatch
    #[arg(long)]
    test: Option<PathBuf>,
    /// Print only the number of results
    #[arg(short, long, default_value_t = false)]
    count: bool,
    /// Show every result instead of the first ten
    #[arg(short = 'N', long, default_value_t = false)]
    all: bool,
    /// Show a text window around the first query term
    #[arg(short, long, default_value_t = false)]
    snippet: bool,
    /// Resolve bare words through their stem class
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Order results by relevance
    #[arg(short, long, default_value_t = false)]
    rank: bool,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, multifield, positional, stem, permuterm } => {
            let config = BuildConfig { multifield, positional, stemming: stem, permuterm };
            build_index(&input, &output, config)
        }
        Commands::Stats { index } => {
            let (index, meta) = load_all(&IndexPaths::new(&index))?;
            println!("created_at: {}", meta.created_at);
            println!("config: {}", serde_json::to_string(&meta.config)?);
            println!("{}", serde_json::to_string_pretty(&index.stats())?);
            Ok(())
        }
        Commands::Query(args) => run_queries(args),
    }
}

fn collect_news_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = if input.is_dir() {
        WalkDir::new(input)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect()
    } else if input.is_file() {
        vec![input.to_path_buf()]
    } else {
        Vec::new()
    };
    // sorted so document and news ids do not depend on directory order
    files.sort();
    files
}

fn build_index(input: &str, output: &str, config: BuildConfig) -> Result<()> {
    let files = collect_news_files(Path::new(input));
    if files.is_empty() {
        bail!("no .json news files under {input}");
    }

    let mut builder = IndexBuilder::new(config);
    let mut skipped = 0;
    for file in &files {
        let abs = fs::canonicalize(file).unwrap_or_else(|_| file.clone());
        match ingest_file(&mut builder, &abs) {
            Ok(summary) => skipped += summary.skipped,
            Err(e) => tracing::warn!(file = %file.display(), error = %e, "skipping unreadable news file"),
        }
    }
    tracing::info!(files = files.len(), news = builder.num_news(), skipped, "ingested documents");

    let index = builder.finish();
    save_all(&IndexPaths::new(output), &index)?;
    tracing::info!(output, "index build complete");
    Ok(())
}

fn run_queries(args: QueryArgs) -> Result<()> {
    let (index, _) = load_all(&IndexPaths::new(&args.index))?;
    let options = QueryOptions { stemming: args.stem, ranking: args.rank };

    if let Some(path) = &args.test {
        return run_test_file(&index, path, &options);
    }
    let queries: Vec<String> = match (&args.query, &args.list) {
        (Some(q), _) => vec![q.clone()],
        (None, Some(path)) => read_lines(path)?,
        (None, None) => bail!("one of --query, --list or --test is required"),
    };

    let mut out = io::stdout().lock();
    if args.count {
        print_counts(&index, &queries, &options, &mut out)?;
        return Ok(());
    }
    for q in &queries {
        if let Err(e) = show_results(&index, q, &options, &args, &mut out) {
            writeln!(out, ">>>>{q}\terror: {e}<<<<")?;
        }
    }
    Ok(())
}

/// `query<TAB>count` per line. A failing query is reported in place and the rest still run.
fn print_counts(index: &SearchIndex, queries: &[String], options: &QueryOptions, out: &mut impl Write) -> Result<usize> {
    let mut errors = 0;
    for q in queries {
        match index.count_only(q, options) {
            Ok((_, count)) => writeln!(out, "{q}\t{count}")?,
            Err(e) => {
                errors += 1;
                writeln!(out, ">>>>{q}\terror: {e}<<<<")?;
            }
        }
    }
    Ok(errors)
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')).map(String::from).collect())
}

fn run_test_file(index: &SearchIndex, path: &Path, options: &QueryOptions) -> Result<()> {
    let failures = check_counts(index, &read_lines(path)?, options, &mut io::stdout().lock())?;
    if failures > 0 {
        bail!("{failures} queries returned an unexpected count");
    }
    println!("all queries returned the expected count");
    Ok(())
}

/// Compare each `query<TAB>expected` line against the index and return how many did not match.
/// Queries that fail to resolve count as mismatches.
fn check_counts(index: &SearchIndex, lines: &[String], options: &QueryOptions, out: &mut impl Write) -> Result<usize> {
    let mut failures = 0;
    for line in lines {
        let Some((q, expected)) = line.rsplit_once('\t') else {
            bail!("malformed test line {line:?}, expected `query<TAB>count`");
        };
        let expected: usize = expected.trim().parse().with_context(|| format!("bad count in {line:?}"))?;
        match index.count_only(q, options) {
            Ok((_, got)) if got == expected => writeln!(out, "{q}\t{got}")?,
            Ok((_, got)) => {
                failures += 1;
                writeln!(out, ">>>>{q}\t{expected} != {got}<<<<")?;
            }
            Err(e) => {
                failures += 1;
                writeln!(out, ">>>>{q}\terror: {e}<<<<")?;
            }
        }
    }
    Ok(failures)
}

fn show_results(index: &SearchIndex, q: &str, options: &QueryOptions, args: &QueryArgs, out: &mut impl Write) -> Result<()> {
    let hits = index.search(q, options)?;
    let node = parse(q)?;
    let terms: Vec<&str> = node.positive_terms().into_iter().map(|(_, t)| t).collect();
    let shown = if args.all { hits.len() } else { hits.len().min(SHOW_MAX) };
    let ids: Vec<_> = hits.iter().take(shown).map(|h| h.news_id).collect();
    let items = load_news_items(index, &ids);

    writeln!(out, "========================================")?;
    writeln!(out, "Query: '{q}'")?;
    writeln!(out, "Number of results: {}", hits.len())?;
    for (rank, hit) in hits.iter().take(shown).enumerate() {
        let Some(at) = index.lookup(hit.news_id) else { continue };
        let item = items.get(&hit.news_id);
        let title = item.map(|i| i.title.as_str()).unwrap_or("<unavailable>");
        let score = hit.score.map(|s| format!("{s:.3}")).unwrap_or_else(|| "0".into());
        writeln!(out, "#{:<4} ({score}) ({}) ({}) {title}", rank + 1, hit.news_id, at.doc_id)?;
        if let (true, Some(item)) = (args.snippet, item) {
            writeln!(out, "      {}", snippet(&item.article, &terms, SNIPPET_WIDTH))?;
        }
    }
    if shown < hits.len() {
        writeln!(out, "... {} more results, use --all to show them", hits.len() - shown)?;
    }
    writeln!(out, "========================================")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsdex::NewsItem;

    fn tiny_index() -> SearchIndex {
        let mut builder = IndexBuilder::new(BuildConfig::default());
        let doc = builder.add_document("memoria");
        for article in ["madrid gana la liga", "barcelona gana la copa"] {
            builder.add_news(doc, &NewsItem { article: article.into(), ..Default::default() });
        }
        builder.finish()
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_mode_keeps_going_after_a_bad_query() {
        let index = tiny_index();
        let mut out = Vec::new();
        let failures = check_counts(
            &index,
            &lines(&["gana\t2", "(madrid\t1", "\"gana la\"\t2", "copa\t5", "liga\t1"]),
            &QueryOptions::default(),
            &mut out,
        )
        .unwrap();
        let out = String::from_utf8(out).unwrap();

        // the phrase needs positions, which this index was built without
        assert_eq!(failures, 3, "{out}");
        assert!(out.contains(">>>>(madrid\terror: parse error"), "{out}");
        assert!(out.contains(">>>>\"gana la\"\terror: unsupported"), "{out}");
        assert!(out.contains(">>>>copa\t5 != 1<<<<"), "{out}");
        assert!(out.ends_with("liga\t1\n"), "{out}");
    }

    #[test]
    fn count_list_reports_errors_in_place() {
        let index = tiny_index();
        let mut out = Vec::new();
        let errors = print_counts(&index, &lines(&["madrid AND", "gana"]), &QueryOptions::default(), &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(errors, 1);
        assert!(out.starts_with(">>>>madrid AND\terror: "), "{out}");
        assert!(out.ends_with("gana\t2\n"), "{out}");
    }

    #[test]
    fn malformed_test_line_is_an_error() {
        let err = check_counts(&tiny_index(), &lines(&["sin tabulador"]), &QueryOptions::default(), &mut Vec::new());
        assert!(err.is_err());
    }
}
