use std::fs;
use std::io::Write;
use tempfile::TempDir;

use kbase_core::config::{expand_path, resolve_with_base, Config, Settings};
use kbase_core::data_processor::{DataProcessor, DirectoryCorpus};
use kbase_core::traits::CorpusSource;
use kbase_core::types::DocFrequency;
use kbase_core::Error;

#[test]
fn process_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let mut f = fs::File::create(dir.join("a.txt")).unwrap();
    writeln!(f, "Short text").unwrap();

    let docs = DataProcessor::new().process_directory(dir).expect("process");

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "a.txt");
    assert_eq!(docs[0].text.trim(), "Short text");
}

#[test]
fn process_directory_is_sorted_and_filters_extensions() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("b.txt"), "bravo").unwrap();
    fs::write(dir.join("a.md"), "alpha").unwrap();
    fs::write(dir.join("nested/c.txt"), "charlie").unwrap();
    fs::write(dir.join("image.png"), [0u8, 1, 2]).unwrap();

    let docs = DataProcessor::new().process_directory(dir).expect("process");
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();

    assert_eq!(ids, vec!["a.md", "b.txt", "nested/c.txt"]);
}

#[test]
fn process_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();

    let docs = DataProcessor::new().process_directory_limited(dir, 1).expect("process limited");

    assert_eq!(docs.len(), 1, "limited to one source document");
    assert_eq!(docs[0].id, "a.txt");
}

#[test]
fn process_directory_reads_invalid_utf8_lossily() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("bad.txt"), [b'o', b'k', 0xff, b'!']).unwrap();

    let docs = DataProcessor::new().process_directory(tmp.path()).expect("process");

    assert_eq!(docs.len(), 1);
    assert!(docs[0].text.starts_with("ok"));
}

#[test]
fn missing_directory_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = DataProcessor::new().process_directory(&tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn directory_corpus_reports_progress_and_loads() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("x.txt"), "x ray").unwrap();
    fs::write(tmp.path().join("y.txt"), "yankee").unwrap();

    let mut seen = Vec::new();
    let docs = DataProcessor::with_extensions(["TXT"])
        .process_directory_with(tmp.path(), None, |i, total, _| seen.push((i, total)))
        .expect("process");
    assert_eq!(docs.len(), 2);
    assert_eq!(seen, vec![(0, 2), (1, 2)]);

    let corpus = DirectoryCorpus::new(tmp.path()).with_limit(Some(1));
    assert_eq!(corpus.load_corpus().expect("load").len(), 1);
}

#[test]
fn settings_default_when_no_files() {
    let tmp = TempDir::new().unwrap();
    let config = Config::load_for_env(tmp.path(), "test").expect("config");
    let settings = config.settings().expect("settings");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.reducer.components, 100);
    assert_eq!(settings.vectorizer.min_df, DocFrequency::Count(2));
}

#[test]
fn env_specific_file_overrides_base_file() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        "[index]\nversion = \"v1\"\nsnapshot_dir = \"snapshots\"\n\n[retrieval]\ntop_k = 3\n",
    )
    .unwrap();
    fs::write(tmp.path().join("config.test.toml"), "[retrieval]\ntop_k = 9\n\n[vectorizer]\nmax_df = 1.0\nmin_df = 1\n").unwrap();

    let config = Config::load_for_env(tmp.path(), "test").expect("config");
    let settings = config.settings().expect("settings");

    assert_eq!(settings.retrieval.top_k, 9);
    assert_eq!(settings.index.version, "v1");
    assert_eq!(settings.vectorizer.max_df, DocFrequency::Proportion(1.0));
    assert_eq!(settings.vectorizer.min_df, DocFrequency::Count(1));
    let top_k: usize = config.get("retrieval.top_k").expect("key");
    assert_eq!(top_k, 9);
    assert_eq!(config.base_dir(), tmp.path());
    assert_eq!(config.resolve_path(&settings.index.snapshot_dir), tmp.path().join("snapshots"));
}

#[test]
fn invalid_settings_fail_to_load() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[vectorizer]\nmax_df = 1.5\n").unwrap();
    assert!(Config::load_for_env(tmp.path(), "test").is_err());
}

#[test]
fn resolve_with_base_keeps_absolute_paths() {
    let base = std::path::Path::new("/srv/kb");
    assert_eq!(resolve_with_base(base, "/abs/dir"), std::path::PathBuf::from("/abs/dir"));
    assert_eq!(resolve_with_base(base, "rel"), base.join("rel"));
    assert_eq!(expand_path("plain"), std::path::PathBuf::from("plain"));
}
