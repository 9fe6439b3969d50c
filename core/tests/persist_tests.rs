use newsdex::corpus::{ingest_file, read_news_item};
use newsdex::persist::{load_all, save_all, IndexPaths};
use newsdex::{BuildConfig, IndexBuilder, NewsRef, QueryOptions};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_corpus(dir: &Path) {
    fs::write(
        dir.join("2015-01.json"),
        r#"[
            {"title": "Madrid gana", "date": "2015-01-02", "keywords": "liga", "article": "madrid gana la liga", "summary": "victoria"},
            {"title": "Sin cuerpo", "date": "2015-01-03"},
            {"title": "Copa", "article": "barcelona gana la copa"}
        ]"#,
    )
    .unwrap();
    fs::write(dir.join("2015-02.json"), r#"[{"article": "internet cambia el mercado"}]"#).unwrap();
}

#[test]
fn malformed_records_are_skipped_and_ordinals_stay_consistent() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());

    let mut builder = IndexBuilder::new(BuildConfig::default());
    let first = ingest_file(&mut builder, &dir.path().join("2015-01.json")).unwrap();
    assert_eq!((first.ingested, first.skipped), (2, 1));
    let index = builder.finish();

    let hits = index.resolve("copa", &QueryOptions::default()).unwrap();
    assert_eq!(hits, vec![1]);
    let NewsRef { doc_id, ordinal } = index.lookup(hits[0]).unwrap();
    let origin = &index.doc(doc_id).unwrap().origin;
    let item = read_news_item(Path::new(origin), ordinal).unwrap();
    assert_eq!(item.title, "Copa");
}

#[test]
fn saved_index_answers_like_the_original() {
    let corpus = tempdir().unwrap();
    write_corpus(corpus.path());
    let config = BuildConfig { multifield: true, positional: true, stemming: true, permuterm: true };

    let mut builder = IndexBuilder::new(config);
    for name in ["2015-01.json", "2015-02.json"] {
        ingest_file(&mut builder, &corpus.path().join(name)).unwrap();
    }
    let index = builder.finish();

    let out = tempdir().unwrap();
    let paths = IndexPaths::new(out.path());
    let meta = save_all(&paths, &index).unwrap();
    assert_eq!((meta.num_docs, meta.num_news), (2, 3));

    let (loaded, meta) = load_all(&paths).unwrap();
    assert_eq!(meta.config, config);
    let stem = QueryOptions { stemming: true, ..Default::default() };
    for q in ["gana AND NOT liga", "inter* OR title:copa", "\"gana la liga\"", "date:2015-01-02", "ganar"] {
        assert_eq!(loaded.resolve(q, &stem).unwrap(), index.resolve(q, &stem).unwrap(), "{q}");
    }
    assert_eq!(loaded.lookup(2), Some(NewsRef { doc_id: 1, ordinal: 0 }));
}

#[test]
fn loading_a_missing_index_fails_with_context() {
    let dir = tempdir().unwrap();
    let err = load_all(&IndexPaths::new(dir.path().join("nope"))).unwrap_err();
    assert!(err.to_string().contains("meta.json"), "{err}");
}
