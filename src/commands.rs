//! Command handlers for the qdrant-mcp CLI.

use std::process::ExitCode;

use qdrant_mcp::Error;
use qdrant_mcp::server::McpServer;
use qdrant_mcp::tools::{
    CollectionArgs, DeleteArgs, FindArgs, StoreArgs, ToolSurface, format_store_receipt,
};
use serde_json::Value;

use crate::output::*;

/// Commands supported by the qdrant-mcp CLI.
#[derive(clap::Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the MCP server on stdin/stdout (default)
    Serve,
    /// Store a memory
    Store {
        /// Memory text content
        content: String,

        /// Optional JSON metadata object
        #[arg(short = 'm', long)]
        metadata: Option<String>,

        /// ID to store under; generated when omitted
        #[arg(long)]
        id: Option<String>,

        /// Target collection
        #[arg(short = 'c', long)]
        collection: Option<String>,
    },
    /// Search memories by meaning
    Find {
        /// Search query text
        query: String,

        /// Maximum number of results (configured default when omitted)
        #[arg(short = 'l', long)]
        limit: Option<u64>,

        /// JSON metadata filter
        #[arg(short = 'f', long)]
        filter: Option<String>,

        /// Minimum similarity score
        #[arg(short = 's', long)]
        score_threshold: Option<f32>,

        /// Target collection
        #[arg(short = 'c', long)]
        collection: Option<String>,
    },
    /// Delete memories by ID
    Delete {
        /// Comma-separated IDs
        ids: String,

        /// Target collection
        #[arg(short = 'c', long)]
        collection: Option<String>,
    },
    /// List every collection in the backend
    Collections,
    /// Show collection statistics
    Info {
        /// Target collection
        #[arg(short = 'c', long)]
        collection: Option<String>,
    },
    Version,
}

/// Execute a CLI command against the tool surface.
pub async fn execute(command: Commands, tools: &ToolSurface, json: bool) -> Result<ExitCode, Error> {
    match command {
        Commands::Serve => handle_serve(tools).await,
        Commands::Store {
            content,
            metadata,
            id,
            collection,
        } => {
            let args = StoreArgs {
                content,
                metadata: metadata.map(Value::String),
                id,
                collection_name: collection,
            };
            handle_store(tools, args, json).await
        }
        Commands::Find {
            query,
            limit,
            filter,
            score_threshold,
            collection,
        } => {
            let args = FindArgs {
                query,
                limit,
                filter: filter.map(Value::String),
                score_threshold,
                collection_name: collection,
            };
            handle_find(tools, args, json).await
        }
        Commands::Delete { ids, collection } => {
            let args = DeleteArgs {
                ids: Value::String(ids),
                collection_name: collection,
            };
            handle_delete(tools, args, json).await
        }
        Commands::Collections => handle_collections(tools, json).await,
        Commands::Info { collection } => {
            handle_info(
                tools,
                CollectionArgs {
                    collection_name: collection,
                },
                json,
            )
            .await
        }
        Commands::Version => Ok(handle_version(json)),
    }
}

async fn handle_serve(tools: &ToolSurface) -> Result<ExitCode, Error> {
    McpServer::new(tools.clone())
        .run_stdio()
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    Ok(ExitCode::SUCCESS)
}

async fn handle_store(tools: &ToolSurface, args: StoreArgs, json: bool) -> Result<ExitCode, Error> {
    let receipt = tools.store(args).await?;
    if json {
        print_json(&StoreResponse::from(receipt));
    } else {
        println!("{}", format_store_receipt(&receipt));
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_find(tools: &ToolSurface, args: FindArgs, json: bool) -> Result<ExitCode, Error> {
    let collection = tools.resolve_collection(args.collection_name.as_deref());
    let results = tools.find(args).await?;
    if json {
        print_json(&FindResponse {
            collection,
            results,
        });
    } else {
        println!("{}", render_results(&collection, &results));
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_delete(tools: &ToolSurface, args: DeleteArgs, json: bool) -> Result<ExitCode, Error> {
    let summary = tools.delete(args).await?;
    if json {
        print_json(&summary);
    } else {
        println!("{}", render_delete(&summary));
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_collections(tools: &ToolSurface, json: bool) -> Result<ExitCode, Error> {
    let collections = tools.list_collections().await?;
    if json {
        print_json(&CollectionsResponse { collections });
    } else if collections.is_empty() {
        println!("No collections");
    } else {
        for name in collections {
            println!("{}", name);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_info(tools: &ToolSurface, args: CollectionArgs, json: bool) -> Result<ExitCode, Error> {
    let info = tools.collection_info(args).await?;
    if json {
        print_json(&info);
    } else {
        println!("{}", render_info(&info));
    }
    Ok(ExitCode::SUCCESS)
}

pub fn handle_version(json: bool) -> ExitCode {
    if json {
        print_json(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "name": env!("CARGO_PKG_NAME")
        }));
    } else {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }
    ExitCode::SUCCESS
}
