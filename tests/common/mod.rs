//! Common test utilities for kegg-dl integration tests

#![allow(dead_code)]

use std::sync::Arc;

use kegg_dl::{Config, FetchConfig, KeggClient, RecordStore, StorageConfig};
use wiremock::{Request, ResponseTemplate};

/// Entry identifiers `hsa:1` ..= `hsa:{count}`
pub fn gene_ids(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("hsa:{i}")).collect()
}

/// Entries named in path segment `segment`, e.g. segment 1 of `/get/hsa:1+hsa:2`
pub fn requested_entries(request: &Request, segment: usize) -> Vec<String> {
    request
        .url
        .path_segments()
        .and_then(|mut segments| segments.nth(segment))
        .map(|entries| entries.split('+').map(str::to_string).collect())
        .unwrap_or_default()
}

/// Flat-file body with one record per entry
pub fn flat_file_body(entries: &[String]) -> String {
    entries
        .iter()
        .map(|entry| {
            let id = entry.split(':').nth(1).unwrap_or(entry);
            format!(
                "ENTRY       {id}              CDS       T01001\n\
                 NAME        GENE{id}\n\
                 PATHWAY     hsa00010  Glycolysis / Gluconeogenesis\n\
                 \x20           hsa01100  Metabolic pathways\n\
                 ///\n"
            )
        })
        .collect()
}

/// Responds to `/get/...` with flat-file records for the requested entries
pub fn flat_file_responder(request: &Request) -> ResponseTemplate {
    let entries = requested_entries(request, 1);
    ResponseTemplate::new(200).set_body_string(flat_file_body(&entries))
}

/// Responds to `/conv/{target}/...` with one row per requested entry
pub fn conv_responder(request: &Request) -> ResponseTemplate {
    let body: String = requested_entries(request, 2)
        .iter()
        .map(|entry| format!("{entry}\tncbi-geneid:{}\n", entry.trim_start_matches("hsa:")))
        .collect();
    ResponseTemplate::new(200).set_body_string(body)
}

/// Config pointing at `base_url` with the given rate and storage directory
pub fn test_config(base_url: &str, rate: u32, storage: &std::path::Path) -> Config {
    Config {
        fetch: FetchConfig {
            base_url: base_url.to_string(),
            rate_limit_per_second: rate,
            ..Default::default()
        },
        storage: StorageConfig {
            storage_path: storage.to_path_buf(),
            db_name: "kegg".to_string(),
        },
    }
}

/// HTTP client with an optional store attached
pub fn create_client(config: Config, store: Option<Arc<dyn RecordStore>>) -> KeggClient {
    let client = KeggClient::new(config).unwrap();
    match store {
        Some(store) => client.with_store(store),
        None => client,
    }
}
