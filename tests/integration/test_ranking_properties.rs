//! Property tests for flat index ranking: determinism, k clamping and
//! position-ordered tie-breaking.

use proptest::prelude::*;
use wenda::config::EmbeddingStrategy;
use wenda::{CorpusSource, DistanceMetric, FlatIndex, Record, Retriever, Settings};

const DIM: usize = 8;

/// Non-zero vectors, so cosine normalization is defined.
fn arb_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter("non-zero vector", |v| {
        v.iter().map(|x| x * x).sum::<f32>() > 1e-6
    })
}

fn arb_metric() -> impl Strategy<Value = DistanceMetric> {
    prop_oneof![Just(DistanceMetric::Cosine), Just(DistanceMetric::L2)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn query_is_deterministic_and_sorted(
        rows in proptest::collection::vec(arb_vector(DIM), 1..40),
        query in arb_vector(DIM),
        metric in arb_metric(),
        k in 1usize..50,
    ) {
        let index = FlatIndex::build(metric, rows.clone()).unwrap();
        let first = index.query(&query, k).unwrap();
        let second = index.query(&query, k).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), k.min(rows.len()));
        for pair in first.windows(2) {
            prop_assert!(pair[0].score.get() >= pair[1].score.get());
            if pair[0].score.get() == pair[1].score.get() {
                prop_assert!(pair[0].position < pair[1].position);
            }
        }
    }

    #[test]
    fn duplicates_come_back_in_position_order(
        rows in proptest::collection::vec(arb_vector(DIM), 0..20),
        duplicate in arb_vector(DIM),
        slots in proptest::collection::btree_set(0usize..30, 2..5),
        metric in arb_metric(),
    ) {
        // Splice copies of `duplicate` into the rows at increasing indices
        let mut all = rows;
        for slot in &slots {
            let at = (*slot).min(all.len());
            all.insert(at, duplicate.clone());
        }
        let expected: Vec<usize> = all
            .iter()
            .enumerate()
            .filter(|(_, row)| **row == duplicate)
            .map(|(i, _)| i)
            .collect();

        let index = FlatIndex::build(metric, all.clone()).unwrap();
        let results = index.query(&duplicate, all.len()).unwrap();
        let tied: Vec<usize> = results
            .iter()
            .map(|n| n.position.as_index())
            .filter(|i| expected.contains(i))
            .collect();

        prop_assert_eq!(tied, expected);
    }
}

#[test]
fn test_engine_tie_break_is_stable() {
    let mut settings = Settings::default();
    settings.embedding.strategy = EmbeddingStrategy::Mock;
    let retriever = Retriever::new(&settings);
    retriever
        .initialize(CorpusSource::Records(vec![
            Record::new("x", "租房需要注意什么", "合同"),
            Record::new("dup-1", "墨尔本怎么坐公交车", "答案一"),
            Record::new("y", "怎么办理银行卡", "护照"),
            Record::new("dup-2", "墨尔本怎么坐公交车", "答案二"),
        ]))
        .unwrap();

    for _ in 0..10 {
        retriever.clear_cache();
        let results = retriever.search("墨尔本怎么坐公交车", 2).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["dup-1", "dup-2"]);
        assert_eq!(results[0].score, results[1].score);
    }
}

#[test]
fn test_k_larger_than_corpus_returns_everything() {
    let mut settings = Settings::default();
    settings.embedding.strategy = EmbeddingStrategy::TfIdf;
    let retriever = Retriever::new(&settings);
    retriever
        .initialize(CorpusSource::Records(vec![
            Record::new("1", "墨尔本怎么坐公交车", "使用Myki卡"),
            Record::new("2", "租房需要注意什么", "仔细阅读合同"),
        ]))
        .unwrap();

    let results = retriever.search("公交车", 100).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].rank, 2);
}

#[test]
fn test_empty_corpus_returns_no_results() {
    let mut settings = Settings::default();
    settings.embedding.strategy = EmbeddingStrategy::TfIdf;
    let retriever = Retriever::new(&settings);
    retriever.initialize(CorpusSource::Records(Vec::new())).unwrap();

    assert!(retriever.is_ready());
    assert!(retriever.search("公交车", 5).unwrap().is_empty());
}
