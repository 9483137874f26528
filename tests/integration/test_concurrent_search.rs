//! One ready engine shared across threads, including while it is rebuilt.

use std::sync::Arc;
use std::thread;

use wenda::config::EmbeddingStrategy;
use wenda::{CorpusSource, Record, Retriever, Settings};

fn corpus() -> Vec<Record> {
    vec![
        Record::new("1", "墨尔本怎么坐公交车", "使用Myki卡").with_tags(["交通"]),
        Record::new("2", "如何使用Myki卡", "刷卡上下车").with_tags(["交通"]),
        Record::new("3", "租房需要注意什么", "仔细阅读合同").with_tags(["生活"]),
        Record::new("4", "怎么办理银行卡", "带护照去银行开户").with_tags(["生活"]),
    ]
}

fn ready_retriever() -> Arc<Retriever> {
    let mut settings = Settings::default();
    settings.embedding.strategy = EmbeddingStrategy::TfIdf;
    let retriever = Retriever::new(&settings);
    retriever.initialize(CorpusSource::Records(corpus())).unwrap();
    Arc::new(retriever)
}

#[test]
fn test_parallel_searches_agree() {
    let retriever = ready_retriever();
    let expected = retriever.search("公交车", 3).unwrap();
    retriever.clear_cache();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let retriever = Arc::clone(&retriever);
            thread::spawn(move || {
                (0..50)
                    .map(|_| retriever.search("公交车", 3).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for results in handle.join().unwrap() {
            assert_eq!(results, expected);
        }
    }
}

#[test]
fn test_searches_during_rebuild_see_a_whole_snapshot() {
    let retriever = ready_retriever();
    let mut grown = corpus();
    grown.push(Record::new("5", "公交车几点停运", "大部分线路午夜停运").with_tags(["交通"]));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let retriever = Arc::clone(&retriever);
            thread::spawn(move || {
                for _ in 0..100 {
                    let results = retriever.search("公交车", 10).unwrap();
                    // Either the old four records or the new five, never a mix
                    assert!(results.len() == 4 || results.len() == 5);
                    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
                }
            })
        })
        .collect();

    let writer = {
        let retriever = Arc::clone(&retriever);
        thread::spawn(move || retriever.build(grown).unwrap())
    };

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(retriever.stats().record_count, 5);
    assert_eq!(retriever.search("公交车几点停运", 1).unwrap()[0].id, "5");
}
