//! pubmed-abstracts - PubMed abstract search and export
//!
//! Searches PubMed for a keyword within a publication date range, fetches each
//! matching article and writes a six-column table sorted by publication date.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! pubmed-abstracts search "PFAS exposure" --start 2020-01-01 --end 2020-12-31
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! pubmed-abstracts serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pubmed_abstracts::{
    database::Database,
    entrez::{self, EntrezClient, EntrezConfig},
    export::{self, TableFormat},
    flatten::{ArticleRow, ResultTable},
    query::{QueryExecutor, SearchCriteria},
    PubmedError,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// PubMed abstract search and export
#[derive(Parser)]
#[command(name = "pubmed-abstracts")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search PubMed and export the result table
    Search {
        /// Search keyword (matched against title and abstract)
        keyword: String,

        /// First publication date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last publication date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Output file format
        #[arg(long, value_enum, default_value_t = FormatArg::Csv)]
        format: FormatArg,

        #[command(flatten)]
        entrez: EntrezArgs,
    },

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[command(flatten)]
        entrez: EntrezArgs,
    },
}

/// E-utilities connection and contact identity
#[derive(Args)]
struct EntrezArgs {
    /// Contact email sent to NCBI with every request
    #[arg(long, env = "ENTREZ_EMAIL", default_value = entrez::DEFAULT_EMAIL)]
    email: String,

    /// Tool name sent to NCBI with every request
    #[arg(long, env = "ENTREZ_TOOL", default_value = entrez::DEFAULT_TOOL)]
    tool: String,

    /// E-utilities base URL
    #[arg(long, env = "ENTREZ_BASE_URL", default_value = entrez::DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = entrez::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Minimum spacing between requests in milliseconds
    #[arg(long, default_value_t = entrez::DEFAULT_MIN_INTERVAL_MS)]
    min_interval_ms: u64,
}

impl EntrezArgs {
    fn into_config(self) -> EntrezConfig {
        EntrezConfig {
            base_url: self.base_url,
            email: self.email,
            tool: self.tool,
            timeout: Duration::from_secs(self.timeout_secs),
            min_interval: Duration::from_millis(self.min_interval_ms),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Tsv,
}

impl From<FormatArg> for TableFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => TableFormat::Csv,
            FormatArg::Tsv => TableFormat::Tsv,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if cli.json_logs {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .init();
    }

    match cli.command {
        Commands::Search {
            keyword,
            start,
            end,
            output,
            format,
            entrez,
        } => run_search(keyword, start, end, output, format.into(), entrez.into_config()).await,
        Commands::Serve { port, host, entrez } => {
            run_server(host, port, entrez.into_config()).await
        }
    }
}

// ============================================================================
// Search
// ============================================================================

async fn run_search(
    keyword: String,
    start: NaiveDate,
    end: NaiveDate,
    output_dir: PathBuf,
    format: TableFormat,
    config: EntrezConfig,
) -> Result<()> {
    // Validate before touching the network
    let criteria = SearchCriteria::new(keyword, start, end)?;
    let executor = QueryExecutor::new(EntrezClient::new(config)?);

    println!(
        "Searching PubMed for \"{}\" from {} to {}...",
        criteria.keyword(),
        start,
        end
    );

    let table = executor
        .execute(&criteria)
        .await
        .context("PubMed search failed")?;

    if table.is_empty() {
        println!("No articles found.");
    } else {
        println!("Found {} articles:\n", table.len());
        for row in &table {
            println!("  {:<14} {}", row.publication_date, row.title);
        }
        println!();
    }

    let path = export::save_table(&table, &output_dir, criteria.keyword(), format)
        .context("Failed to write output file")?;

    println!("✓ Saved: {}", path.display());
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(host: String, port: u16, config: EntrezConfig) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");

    let app_state = Arc::new(AppState::new(EntrezClient::new(config)?));

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app(app_state))
        .await
        .context("Server error")?;

    Ok(())
}

fn app<D: Database + 'static>(state: Arc<AppState<D>>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/search", post(search_handler::<D>))
        .route("/export", get(export_handler::<D>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

struct AppState<D> {
    executor: QueryExecutor<D>,
    /// Table of the last successful search, downloaded by `/export`
    last_result: Mutex<Option<(SearchCriteria, ResultTable)>>,
}

impl<D: Database> AppState<D> {
    fn new(database: D) -> Self {
        Self {
            executor: QueryExecutor::new(database),
            last_result: Mutex::new(None),
        }
    }

    fn remember(&self, criteria: SearchCriteria, table: ResultTable) {
        let mut last = self
            .last_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *last = Some((criteria, table));
    }

    /// CSV text of the remembered table, if it was produced by `criteria`
    fn cached_csv(&self, criteria: &SearchCriteria) -> Option<pubmed_abstracts::Result<String>> {
        let last = self
            .last_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match last.as_ref() {
            Some((cached, table)) if cached == criteria => Some(export::to_csv_string(table)),
            _ => None,
        }
    }
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Search request body, also used as export query parameters
#[derive(Debug, Deserialize)]
struct SearchRequest {
    keyword: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

/// Search response
#[derive(Debug, Serialize)]
struct SearchResponse {
    status: String,
    count: usize,
    filename: String,
    results: Vec<ArticleRow>,
}

/// Input problems are the caller's to fix; everything else came from PubMed
fn error_status(e: &PubmedError) -> StatusCode {
    match e {
        PubmedError::Input(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn search_failure(e: PubmedError, filename: String) -> (StatusCode, Json<SearchResponse>) {
    error!(error = %e, "Search failed");
    (
        error_status(&e),
        Json(SearchResponse {
            status: format!("error: {}", e),
            count: 0,
            filename,
            results: vec![],
        }),
    )
}

/// Search endpoint handler
async fn search_handler<D: Database + 'static>(
    State(state): State<Arc<AppState<D>>>,
    Json(req): Json<SearchRequest>,
) -> (StatusCode, Json<SearchResponse>) {
    info!(keyword = %req.keyword, start = %req.start_date, end = %req.end_date, "Search request");

    let filename = export::export_file_name(&req.keyword, TableFormat::Csv);
    let criteria = match SearchCriteria::new(req.keyword, req.start_date, req.end_date) {
        Ok(criteria) => criteria,
        Err(e) => return search_failure(e, filename),
    };

    match state.executor.execute(&criteria).await {
        Ok(table) => {
            let rows = table.rows().to_vec();
            state.remember(criteria, table);
            (
                StatusCode::OK,
                Json(SearchResponse {
                    status: "success".to_string(),
                    count: rows.len(),
                    filename,
                    results: rows,
                }),
            )
        }
        Err(e) => search_failure(e, filename),
    }
}

/// CSV download of the table produced by the last matching `/search`
async fn export_handler<D: Database + 'static>(
    State(state): State<Arc<AppState<D>>>,
    Query(req): Query<SearchRequest>,
) -> std::result::Result<impl IntoResponse, (StatusCode, String)> {
    info!(keyword = %req.keyword, start = %req.start_date, end = %req.end_date, "Export request");

    let filename = export::export_file_name(&req.keyword, TableFormat::Csv);
    let disposition = HeaderValue::from_bytes(
        format!("attachment; filename=\"{}\"", filename).as_bytes(),
    )
    .map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "keyword cannot be used as a file name".to_string(),
        )
    })?;

    let criteria = SearchCriteria::new(req.keyword, req.start_date, req.end_date)
        .map_err(|e| (error_status(&e), e.to_string()))?;

    let body = state
        .cached_csv(&criteria)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                "No results for these search criteria, run the search first".to_string(),
            )
        })?
        .map_err(|e| {
            error!(error = %e, "Export failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
