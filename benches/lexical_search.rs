use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use ragcore::domain::models::{DocumentMetadata, MetadataFilter, ProcessedDocument};
use ragcore::domain::ports::VectorStore;
use ragcore::InMemoryVectorStore;

const TOPICS: [&str; 5] = ["backup", "deploy", "rollback", "incident", "billing"];

fn populated_store(rt: &Runtime, chunks: usize) -> InMemoryVectorStore {
    let store = InMemoryVectorStore::new("bench");
    let documents: Vec<ProcessedDocument> = (0..chunks)
        .map(|i| {
            let topic = TOPICS[i % TOPICS.len()];
            let mut metadata = DocumentMetadata::new(format!("source-{}", i / 4));
            metadata.category = Some(topic.to_string());
            ProcessedDocument::new(
                ProcessedDocument::chunk_id(&metadata.source_id, i % 4),
                format!("Runbook entry {i}: the {topic} procedure requires two reviewers and a ticket."),
                metadata,
            )
        })
        .collect();

    rt.block_on(async {
        store.initialize().await.expect("memory store initializes");
        store.add_documents(&documents).await.expect("memory store accepts documents");
    });
    store
}

fn bench_search(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let filter = MetadataFilter::new().equals("category", "rollback");
    let mut group = c.benchmark_group("memory_search");

    for chunks in [100, 1_000, 10_000] {
        let store = populated_store(&rt, chunks);

        group.bench_with_input(BenchmarkId::new("unfiltered", chunks), &store, |b, store| {
            b.to_async(&rt)
                .iter(|| async { store.search(black_box("rollback procedure reviewers"), 10).await });
        });
        group.bench_with_input(BenchmarkId::new("filtered", chunks), &store, |b, store| {
            b.to_async(&rt).iter(|| async {
                store
                    .search_with_filter(black_box("procedure reviewers"), &filter, 10)
                    .await
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
