//! JSON response types and formatting for CLI output.

use serde::Serialize;

use qdrant_mcp::{CollectionInfo, DeleteSummary, SearchResult, StoreReceipt};

/// Response for a successful store.
#[derive(Serialize)]
pub struct StoreResponse {
    pub status: &'static str,
    pub id: String,
    pub collection: String,
}

impl From<StoreReceipt> for StoreResponse {
    fn from(receipt: StoreReceipt) -> Self {
        Self {
            status: "stored",
            id: receipt.id,
            collection: receipt.collection,
        }
    }
}

/// Response for search results.
#[derive(Serialize)]
pub struct FindResponse {
    pub collection: String,
    pub results: Vec<SearchResult>,
}

/// Response for listing collections.
#[derive(Serialize)]
pub struct CollectionsResponse {
    pub collections: Vec<String>,
}

/// Response for errors.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Print a value as formatted JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}

pub fn render_results(collection: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results in collection '{collection}'");
    }
    let mut out = format!("Collection: {collection}\n\n");
    for result in results {
        out.push_str(&format!(
            "{} [score: {:.2}]\n  {}\n",
            result.id, result.score, result.content
        ));
        if !result.metadata.is_empty() {
            out.push_str(&format!(
                "  metadata: {}\n",
                serde_json::Value::Object(result.metadata.clone())
            ));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

pub fn render_delete(summary: &DeleteSummary) -> String {
    format!(
        "Deleted {} of {} requested ID(s) from collection '{}'",
        summary.deleted_count,
        summary.ids.len(),
        summary.collection
    )
}

pub fn render_info(info: &CollectionInfo) -> String {
    format!(
        "Collection: {}\nVectors: {} dimensions ({})\nPoints: {}\nStatus: {}",
        info.name, info.vector_dimensions, info.distance, info.point_count, info.status
    )
}
