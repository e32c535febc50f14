//! End-to-end tests against a local mock of the KEGG REST API
//!
//! Requests go through the real reqwest transport to a wiremock server, so
//! URL construction, status handling, normalization, rate limiting and the
//! record stores are exercised together.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use kegg_dl::{
    Config, Error, Event, FieldValue, GetAllOptions, JsonLinesStore, Operation, RecordStore,
    RequestDescriptor, Shape, SqliteStore, StoreLocation,
};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn twenty_five_genes_in_three_rate_limited_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/get/"))
        .respond_with(flat_file_responder)
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = create_client(test_config(&server.uri(), 3, dir.path()), None);
    let start = Instant::now();

    let collection = client
        .get_all(
            &RequestDescriptor::new(Operation::Get),
            gene_ids(25),
            GetAllOptions::default(),
        )
        .await
        .unwrap()
        .into_in_memory()
        .unwrap();

    // Three requests at 3/s cannot finish before the third slot
    assert!(start.elapsed() >= Duration::from_millis(600));
    assert!(collection.summary.is_complete());
    assert_eq!(collection.data.len(), 25);
    assert_eq!(collection.data.shape(), Shape::FlatFile);

    let first = collection.data.entry("1").unwrap();
    assert_eq!(first["NAME"], FieldValue::from("GENE1"));
    assert_eq!(
        first["PATHWAY"].as_list().unwrap(),
        [
            "hsa00010  Glycolysis / Gluconeogenesis",
            "hsa01100  Metabolic pathways"
        ]
    );

    let requests = server.received_requests().await.unwrap();
    let sizes: Vec<usize> = requests
        .iter()
        .map(|r| requested_entries(r, 1).len())
        .collect();
    let mut sorted = sizes.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![5, 10, 10]);
}

#[tokio::test]
async fn missing_batches_are_reported_not_raised() {
    let server = MockServer::start().await;
    // The second batch (hsa:11..hsa:20) is unknown to the server
    Mock::given(method("GET"))
        .and(path_regex(r"^/conv/ncbi-geneid/hsa:11\+"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/conv/ncbi-geneid/"))
        .respond_with(conv_responder)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = create_client(test_config(&server.uri(), 50, dir.path()), None);
    let mut events = client.subscribe();

    let collection = client
        .get_all(
            &RequestDescriptor::conv("ncbi-geneid"),
            gene_ids(30),
            GetAllOptions::default(),
        )
        .await
        .unwrap()
        .into_in_memory()
        .unwrap();

    assert_eq!(collection.data.len(), 20);
    assert_eq!(collection.summary.succeeded_batches, 2);
    assert_eq!(collection.summary.failures.len(), 1);
    assert_eq!(collection.summary.failures[0].batch.index(), 1);
    assert_eq!(collection.summary.failures[0].error.code(), "http_status");

    let mut failed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::BatchFailed { index, code, .. } = event {
            failed.push((index, code));
        }
    }
    assert_eq!(failed, vec![(1, "http_status".to_string())]);

    let tsv = collection.data.to_text().unwrap();
    assert!(tsv.starts_with("hsa:1\tncbi-geneid:1\n"));
    assert!(!tsv.contains("hsa:15\t"));
}

#[tokio::test]
async fn unknown_first_batch_aborts_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = create_client(test_config(&server.uri(), 50, dir.path()), None);

    let err = client
        .get_all(
            &RequestDescriptor::ddi(Vec::<String>::new()),
            ["D00564", "D00100", "D00109"],
            GetAllOptions::default().with_batch_size(1),
        )
        .await
        .unwrap_err();

    match err {
        Error::Transport(kegg_dl::TransportError::Status { status, message, .. }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Bad Request");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn streams_to_json_lines_with_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/get/"))
        .respond_with(flat_file_responder)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), 50, dir.path());
    let store = Arc::new(JsonLinesStore::open(&config.storage).await.unwrap());
    let client = create_client(config, Some(store.clone() as Arc<dyn RecordStore>));

    let handle = client
        .get_all(
            &RequestDescriptor::new(Operation::Get),
            gene_ids(25),
            GetAllOptions::stream(),
        )
        .await
        .unwrap()
        .into_persisted()
        .unwrap();

    assert_eq!(handle.key, "kegg_get");
    assert_eq!(handle.items_written, 25);
    let path = dir.path().join("kegg_get.jsonl");
    assert_eq!(handle.location, StoreLocation::File { path: path.clone() });

    let lines = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(lines.lines().count(), 25);

    let metadata: serde_json::Value = serde_json::from_str(
        &tokio::fs::read_to_string(dir.path().join("kegg_metadata.json"))
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(metadata["kegg_get"]["item_count"], 25);
    assert_eq!(metadata["kegg_get"]["format"], "jsonl");
}

#[tokio::test]
async fn streams_to_sqlite() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/conv/"))
        .respond_with(conv_responder)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), 50, dir.path());
    let store = Arc::new(
        SqliteStore::open(&config.storage.database_path())
            .await
            .unwrap(),
    );
    let client = create_client(config, Some(store.clone() as Arc<dyn RecordStore>));
    let template = RequestDescriptor::conv("ncbi-geneid");

    let persisted = client
        .get_all(&template, gene_ids(25), GetAllOptions::stream())
        .await
        .unwrap()
        .into_persisted()
        .unwrap();
    let in_memory = client
        .get_all(&template, gene_ids(25), GetAllOptions::default())
        .await
        .unwrap()
        .into_in_memory()
        .unwrap();

    assert!(matches!(persisted.location, StoreLocation::Table { .. }));
    assert_eq!(store.count("kegg_conv").await.unwrap(), 25);
    let stored = store.read_records("kegg_conv").await.unwrap();
    assert_eq!(stored, in_memory.data.records());
}

#[tokio::test]
async fn single_requests_cover_non_entry_operations() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info/kegg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("kegg             Kyoto Encyclopedia of Genes and Genomes\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/find/genes/shiga%20toxin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ece:Z1464\tstx2A; shiga-like toxin II A subunit\n"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = create_client(test_config(&server.uri(), 50, dir.path()), None);

    let info = client.get(&RequestDescriptor::info("kegg")).await.unwrap();
    assert_eq!(info.shape(), Shape::Text);
    assert!(info.text().unwrap().contains("Kyoto Encyclopedia"));

    let found = client
        .get(&RequestDescriptor::find("genes", "shiga toxin"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found.records()[0]["entry_id"], FieldValue::from("ece:Z1464"));
}

#[tokio::test]
async fn config_loaded_from_json_drives_the_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/conv/"))
        .respond_with(conv_responder)
        .expect(5)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("kegg.json");
    let json = serde_json::json!({
        "base_url": server.uri(),
        "batch_size": 2,
        "rate_limit_per_second": 100,
        "max_concurrency": 2,
        "request_timeout": 5,
        "storage": { "storage_path": dir.path() }
    });
    tokio::fs::write(&config_path, json.to_string()).await.unwrap();

    let config = Config::load(&config_path).await.unwrap();
    assert_eq!(config.fetch.batch_size, 2);
    assert_eq!(config.storage.db_name, "kegg");

    let client = create_client(config, None);
    let result = client
        .get_all(
            &RequestDescriptor::conv("ncbi-geneid"),
            gene_ids(9),
            GetAllOptions::default(),
        )
        .await
        .unwrap();
    assert!(result.summary().is_complete());
}
