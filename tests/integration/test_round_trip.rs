//! Build, save and reload an index, checking the reloaded engine answers
//! exactly like the freshly built one.

use tempfile::TempDir;
use wenda::config::EmbeddingStrategy;
use wenda::io::ExitCode;
use wenda::persistence::{METADATA_FILE, RECORDS_FILE, VECTORS_FILE};
use wenda::{
    ArtifactStatus, CorpusSource, DistanceMetric, ErrorKind, IndexPersistence, PersistenceError,
    Record, RecordStore, Retriever, RetrieverError, Settings, StoreError,
};

fn settings(strategy: EmbeddingStrategy, metric: DistanceMetric) -> Settings {
    let mut settings = Settings::default();
    settings.embedding.strategy = strategy;
    settings.embedding.mock_dimension = 256;
    settings.retrieval.metric = metric;
    settings
}

fn bus_corpus() -> Vec<Record> {
    vec![
        Record::new("1", "墨尔本怎么坐公交车？", "在车站或便利店购买Myki卡后刷卡上车"),
        Record::new("2", "如何使用Myki卡？", "上车和下车时都要在读卡器上刷卡"),
    ]
}

fn larger_corpus() -> Vec<Record> {
    vec![
        Record::new("1", "墨尔本怎么坐公交车", "使用Myki卡").with_tags(["交通"]),
        Record::new("2", "如何使用Myki卡", "刷卡上下车").with_tags(["交通"]),
        Record::new("3", "租房需要注意什么", "仔细阅读合同").with_tags(["生活"]),
        Record::new("4", "学生签证可以打工吗", "每两周不超过48小时").with_tags(["签证", "学生"]),
        Record::new("5", "哪里可以买到中国食品", "亚洲超市").with_tags(["生活"]),
        Record::new("6", "怎么办理银行卡", "带护照去银行开户").with_tags(["生活", "学生"]),
    ]
}

fn assert_round_trip(strategy: EmbeddingStrategy, metric: DistanceMetric) {
    let temp_dir = TempDir::new().unwrap();
    let index_path = temp_dir.path().join("index");
    let settings = settings(strategy, metric);

    let fresh = Retriever::new(&settings);
    fresh.initialize(CorpusSource::Records(bus_corpus())).unwrap();
    let metadata = fresh.save(&index_path).unwrap();
    assert_eq!(metadata.record_count, 2);
    assert_eq!(metadata.strategy, strategy);
    assert_eq!(metadata.metric, metric);

    let reloaded = Retriever::new(&settings);
    reloaded
        .initialize(CorpusSource::Persisted(index_path.clone()))
        .unwrap();
    assert!(reloaded.is_ready());

    let expected = fresh.search("公交车", 2).unwrap();
    let actual = reloaded.search("公交车", 2).unwrap();

    assert_eq!(expected[0].id, "1");
    assert_eq!(expected[0].rank, 1);
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(&expected) {
        assert_eq!(a.id, e.id);
        assert_eq!(a.position, e.position);
        assert!(
            (a.score - e.score).abs() < 1e-6,
            "{strategy}/{metric}: {} vs {}",
            a.score,
            e.score
        );
    }
}

#[test]
fn test_round_trip_tfidf_cosine() {
    assert_round_trip(EmbeddingStrategy::TfIdf, DistanceMetric::Cosine);
}

#[test]
fn test_round_trip_tfidf_l2() {
    assert_round_trip(EmbeddingStrategy::TfIdf, DistanceMetric::L2);
}

#[test]
fn test_round_trip_mock_cosine() {
    assert_round_trip(EmbeddingStrategy::Mock, DistanceMetric::Cosine);
}

#[test]
fn test_position_invariant_survives_persistence() {
    let temp_dir = TempDir::new().unwrap();
    let retriever = Retriever::new(&settings(EmbeddingStrategy::TfIdf, DistanceMetric::Cosine));
    retriever
        .initialize(CorpusSource::Records(larger_corpus()))
        .unwrap();
    retriever.save(temp_dir.path()).unwrap();

    let persisted = IndexPersistence::new(temp_dir.path()).load().unwrap();
    assert_eq!(persisted.records.records(), larger_corpus().as_slice());
    assert_eq!(persisted.index.len(), larger_corpus().len());
}

#[test]
fn test_self_match_ranks_first() {
    for strategy in [EmbeddingStrategy::TfIdf, EmbeddingStrategy::Mock] {
        let retriever = Retriever::new(&settings(strategy, DistanceMetric::Cosine));
        retriever
            .initialize(CorpusSource::Records(larger_corpus()))
            .unwrap();

        for record in larger_corpus() {
            let results = retriever.search(&record.question, 6).unwrap();
            assert_eq!(results[0].id, record.id, "{strategy}: {}", record.question);
            assert!((results[0].score - 1.0).abs() < 1e-5);
            assert!(results.iter().all(|r| r.score <= results[0].score));
        }
    }
}

#[test]
fn test_count_mismatch_is_rejected() {
    let three = vec![
        Record::new("1", "问题一", "答案一"),
        Record::new("2", "问题二", "答案二"),
        Record::new("3", "问题三", "答案三"),
    ];
    let err = RecordStore::build(three, 2).unwrap_err();
    assert!(matches!(
        err,
        StoreError::CountMismatch {
            records: 3,
            vectors: 2
        }
    ));

    let err = RetrieverError::from(err);
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_missing_artifact_is_incomplete() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(EmbeddingStrategy::TfIdf, DistanceMetric::Cosine);
    let retriever = Retriever::new(&settings);
    retriever.initialize(CorpusSource::Records(bus_corpus())).unwrap();
    retriever.save(temp_dir.path()).unwrap();

    std::fs::remove_file(temp_dir.path().join(VECTORS_FILE)).unwrap();
    let persistence = IndexPersistence::new(temp_dir.path());
    assert!(matches!(
        persistence.status(),
        ArtifactStatus::Incomplete { .. }
    ));

    let reloaded = Retriever::new(&settings);
    let err = reloaded
        .initialize(CorpusSource::Persisted(temp_dir.path().to_path_buf()))
        .unwrap_err();
    assert!(matches!(
        err,
        RetrieverError::Persistence(PersistenceError::IncompleteState { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(ExitCode::from_error(&err).is_blocking());
    assert!(!reloaded.is_ready());
}

#[test]
fn test_truncated_vectors_are_incomplete() {
    let temp_dir = TempDir::new().unwrap();
    let retriever = Retriever::new(&settings(EmbeddingStrategy::Mock, DistanceMetric::Cosine));
    retriever.initialize(CorpusSource::Records(bus_corpus())).unwrap();
    retriever.save(temp_dir.path()).unwrap();

    let path = temp_dir.path().join(VECTORS_FILE);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

    assert!(matches!(
        IndexPersistence::new(temp_dir.path()).load(),
        Err(PersistenceError::IncompleteState { .. })
    ));
}

#[test]
fn test_oversized_vector_header_is_incomplete() {
    let temp_dir = TempDir::new().unwrap();
    let retriever = Retriever::new(&settings(EmbeddingStrategy::Mock, DistanceMetric::Cosine));
    retriever.initialize(CorpusSource::Records(bus_corpus())).unwrap();
    retriever.save(temp_dir.path()).unwrap();

    // Keep magic, version and metric; claim u32::MAX vectors of u32::MAX dimensions
    let path = temp_dir.path().join(VECTORS_FILE);
    let mut bytes = std::fs::read(&path).unwrap()[..12].to_vec();
    bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    bytes.extend_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let reloaded = Retriever::new(&settings(EmbeddingStrategy::Mock, DistanceMetric::Cosine));
    let err = reloaded.load(temp_dir.path()).unwrap_err();
    assert!(matches!(
        err,
        RetrieverError::Persistence(PersistenceError::IncompleteState { .. })
    ));
    assert!(!reloaded.is_ready());
}

#[test]
fn test_edited_records_fail_checksum() {
    let temp_dir = TempDir::new().unwrap();
    let retriever = Retriever::new(&settings(EmbeddingStrategy::TfIdf, DistanceMetric::Cosine));
    retriever.initialize(CorpusSource::Records(bus_corpus())).unwrap();
    retriever.save(temp_dir.path()).unwrap();

    let path = temp_dir.path().join(RECORDS_FILE);
    let json = std::fs::read_to_string(&path).unwrap();
    assert!(json.contains("墨尔本"));
    std::fs::write(&path, json.replace("墨尔本", "悉尼")).unwrap();

    let err = IndexPersistence::new(temp_dir.path()).load().unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Mismatch {
            what: "corpus checksum",
            ..
        }
    ));
}

#[test]
fn test_missing_directory_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("never-built");
    assert_eq!(
        IndexPersistence::new(&path).status(),
        ArtifactStatus::Missing
    );

    let retriever = Retriever::new(&Settings::default());
    let err = retriever.load(&path).unwrap_err();
    assert_eq!(ExitCode::from_error(&err), ExitCode::NotFound);
    assert!(!path.join(METADATA_FILE).exists());
}
