use papyrus_llm::any::AnyProvider;
use papyrus_llm::mock::MockProvider;
use papyrus_memory::{DocumentStore, QdrantOps, VectorStore};
use papyrus_papers::PaperRecord;
use testcontainers::ContainerAsync;
use testcontainers::GenericImage;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;

const QDRANT_GRPC_PORT: ContainerPort = ContainerPort::Tcp(6334);

fn qdrant_image() -> GenericImage {
    GenericImage::new("qdrant/qdrant", "v1.16.0")
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening"))
        .with_exposed_port(QDRANT_GRPC_PORT)
}

async fn setup_with_qdrant() -> (QdrantOps, ContainerAsync<GenericImage>) {
    let container = qdrant_image().start().await.unwrap();
    let grpc_port = container.get_host_port_ipv4(6334).await.unwrap();
    let url = format!("http://127.0.0.1:{grpc_port}");
    (QdrantOps::new(&url).unwrap(), container)
}

fn embedder() -> papyrus_llm::provider::EmbedFn {
    AnyProvider::Mock(MockProvider::default().with_hashed_embeddings()).embed_fn()
}

fn paper(id: &str, title: &str, summary: &str) -> PaperRecord {
    PaperRecord::new(id, title, "arxiv")
        .with_authors(["Grace Hopper"])
        .with_summary(summary)
}

#[tokio::test]
#[ignore = "requires Docker for the Qdrant testcontainer"]
async fn ensure_collection_is_idempotent() {
    let (ops, _container) = setup_with_qdrant().await;

    VectorStore::ensure_collection(&ops, "papers", 64).await.unwrap();
    VectorStore::ensure_collection(&ops, "papers", 64).await.unwrap();
    assert!(VectorStore::collection_exists(&ops, "papers").await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker for the Qdrant testcontainer"]
async fn add_search_and_delete_papers() {
    let (ops, _container) = setup_with_qdrant().await;
    let store = DocumentStore::new(Box::new(ops), embedder()).with_collection("papers");

    assert!(store.search("compilers", 3).await.unwrap().is_empty());

    store
        .add(&[
            paper("arxiv:1", "Optimizing compilers", "compilers and register allocation"),
            paper("arxiv:2", "Coral reefs", "marine biology of reefs"),
        ])
        .await
        .unwrap();

    let hits = store.search("register allocation in compilers", 2).await.unwrap();
    assert_eq!(hits[0].chunk.paper_id, "arxiv:1");
    assert_eq!(hits[0].chunk.meta("authors"), "Grace Hopper");

    store.delete_papers(&["arxiv:1".into()]).await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.backend, "qdrant");
}

#[tokio::test]
#[ignore = "requires Docker for the Qdrant testcontainer"]
async fn readding_a_paper_keeps_one_point() {
    let (ops, _container) = setup_with_qdrant().await;
    let store = DocumentStore::new(Box::new(ops), embedder()).with_collection("papers");

    store.add(&[paper("arxiv:1", "v1", "first")]).await.unwrap();
    store.add(&[paper("arxiv:1", "v2", "second")]).await.unwrap();

    assert_eq!(store.stats().await.unwrap().count, 1);
}
