//! Load-or-rebuild initialization against an index directory.

use tempfile::TempDir;
use wenda::config::EmbeddingStrategy;
use wenda::persistence::STRATEGY_FILE;
use wenda::{
    ArtifactStatus, CorpusSource, IndexPersistence, Record, RecordStore, Retriever, Settings,
};

fn tfidf_settings() -> Settings {
    let mut settings = Settings::default();
    settings.embedding.strategy = EmbeddingStrategy::TfIdf;
    settings
}

fn first_corpus() -> Vec<Record> {
    vec![
        Record::new("1", "墨尔本怎么坐公交车", "使用Myki卡"),
        Record::new("2", "租房需要注意什么", "仔细阅读合同"),
    ]
}

fn second_corpus() -> Vec<Record> {
    vec![
        Record::new("a", "怎么办理银行卡", "带护照去银行"),
        Record::new("b", "哪里可以买到中国食品", "亚洲超市"),
        Record::new("c", "学生签证可以打工吗", "每两周不超过48小时"),
    ]
}

fn initialize(path: &std::path::Path, records: Vec<Record>, force_rebuild: bool) -> Retriever {
    let retriever = Retriever::new(&tfidf_settings());
    retriever
        .initialize(CorpusSource::PersistedOrBuild {
            path: path.to_path_buf(),
            records,
            force_rebuild,
        })
        .unwrap();
    retriever
}

#[test]
fn test_builds_and_saves_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index");

    let retriever = initialize(&path, first_corpus(), false);
    assert!(retriever.is_ready());
    assert_eq!(IndexPersistence::new(&path).status(), ArtifactStatus::Complete);
}

#[test]
fn test_prefers_persisted_index() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index");
    initialize(&path, first_corpus(), false);

    let retriever = initialize(&path, first_corpus(), false);
    assert_eq!(retriever.stats().record_count, 2);
    assert_eq!(retriever.record_by_id("1").unwrap().question, "墨尔本怎么坐公交车");
}

#[test]
fn test_changed_corpus_is_rebuilt() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index");
    initialize(&path, first_corpus(), false);

    let retriever = initialize(&path, second_corpus(), false);
    assert_eq!(retriever.stats().record_count, 3);
    assert!(retriever.record_by_id("1").is_err());
    assert_eq!(retriever.record_by_id("a").unwrap().question, "怎么办理银行卡");

    let persisted = IndexPersistence::new(&path).load().unwrap();
    assert_eq!(persisted.records.records(), second_corpus().as_slice());
    assert_eq!(
        persisted.metadata.corpus_checksum,
        RecordStore::checksum_of(&second_corpus())
    );
}

#[test]
fn test_edited_answer_keeps_persisted_index() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index");
    initialize(&path, first_corpus(), false);

    // Only ids and questions are embedded, so answers do not force a rebuild
    let mut edited = first_corpus();
    edited[0].answer = "改用Myki Pass".to_string();
    let retriever = initialize(&path, edited, false);
    assert_eq!(retriever.record_by_id("1").unwrap().answer, "使用Myki卡");
}

#[test]
fn test_force_rebuild_replaces_persisted_index() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index");
    initialize(&path, first_corpus(), false);

    let retriever = initialize(&path, second_corpus(), true);
    assert_eq!(retriever.stats().record_count, 3);

    let persisted = IndexPersistence::new(&path).load().unwrap();
    assert_eq!(persisted.metadata.record_count, 3);
    assert_eq!(persisted.records.records(), second_corpus().as_slice());
}

#[test]
fn test_incomplete_index_is_rebuilt() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index");
    initialize(&path, first_corpus(), false);

    std::fs::remove_file(path.join(STRATEGY_FILE)).unwrap();
    assert!(matches!(
        IndexPersistence::new(&path).status(),
        ArtifactStatus::Incomplete { .. }
    ));

    let retriever = initialize(&path, second_corpus(), false);
    assert_eq!(retriever.stats().record_count, 3);
    assert_eq!(IndexPersistence::new(&path).status(), ArtifactStatus::Complete);
}

#[test]
fn test_corpus_file_feeds_build() {
    let temp_dir = TempDir::new().unwrap();
    let corpus_path = temp_dir.path().join("qa.json");
    std::fs::write(
        &corpus_path,
        r#"[
            {"id": 1, "question": "墨尔本怎么坐公交车？", "answer": "使用Myki卡", "tags": ["交通"]},
            {"id": 2, "question": "如何使用Myki卡？", "answer": "刷卡上下车", "tags": ["交通"], "link": null}
        ]"#,
    )
    .unwrap();

    let records = wenda::load_records(&corpus_path).unwrap();
    let retriever = initialize(&temp_dir.path().join("index"), records, false);

    let results = retriever.search("公交车", 5).unwrap();
    assert_eq!(results[0].id, "1");
    assert_eq!(retriever.categories().unwrap(), vec!["交通".to_string()]);
}
