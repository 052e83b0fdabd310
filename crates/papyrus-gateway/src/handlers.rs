use std::convert::Infallible;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use papyrus_core::assistant::{IndexReport, RouteDecision, SearchResults};
use papyrus_core::citation::{Citation, CitationFields};
use papyrus_core::summarizer::{PaperSummary, SummaryFormat, SummaryOptions};
use papyrus_core::{AssistantError, RetrievalResult};
use papyrus_memory::StoreStats;
use papyrus_papers::{BatchItem, PaperRecord};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Deserialize)]
pub(crate) struct ChatRequest {
    pub question: String,
}

#[derive(Deserialize)]
pub(crate) struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Deserialize, Default)]
pub(crate) struct SummarizeRequest {
    #[serde(default)]
    pub paper_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub num_points: Option<usize>,
}

impl SummarizeRequest {
    fn options(&self) -> Result<SummaryOptions, AssistantError> {
        let defaults = SummaryOptions::default();
        Ok(SummaryOptions {
            format: match self.format.as_deref() {
                Some(f) => f.parse()?,
                None => SummaryFormat::default(),
            },
            max_length: self.max_length.unwrap_or(defaults.max_length),
            num_points: self.num_points.unwrap_or(defaults.num_points),
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct PaperIdsRequest {
    pub paper_ids: Vec<String>,
}

#[derive(Deserialize)]
pub(crate) struct CiteRequest {
    #[serde(flatten)]
    pub fields: CitationFields,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct RouteRequest {
    pub query: String,
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<RetrievalResult> {
    let Json(req) = body?;
    Ok(Json(state.assistant.rag().answer(&req.question).await?))
}

/// Server-sent events: one `sources` event, unnamed chunk events, then `done`.
/// A failure mid-generation is sent as an `error` event.
pub(crate) async fn chat_stream_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(req) = body?;
    let answer = state.assistant.rag().stream(&req.question).await?;

    let sources = Event::default()
        .event("sources")
        .json_data(&answer.sources)
        .map_err(|e| AssistantError::Generation(format!("failed to encode sources: {e}")))?;

    let chunks = answer.chunks.map(|item| {
        Ok::<_, Infallible>(match item {
            Ok(text) => Event::default().data(text.replace('\r', "")),
            Err(e) => {
                tracing::warn!("answer stream failed: {e}");
                Event::default().event("error").data(e.to_string().replace('\r', ""))
            }
        })
    });

    let events = stream::once(async move { Ok::<_, Infallible>(sources) })
        .chain(chunks)
        .chain(stream::once(async {
            Ok::<_, Infallible>(Event::default().event("done").data("[DONE]"))
        }));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub(crate) async fn search_handler(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<SearchResults> {
    let Json(req) = body?;
    search(&state, &req).await
}

pub(crate) async fn search_query_handler(
    State(state): State<AppState>,
    query: Result<Query<SearchRequest>, QueryRejection>,
) -> ApiResult<SearchResults> {
    let Query(req) = query?;
    search(&state, &req).await
}

async fn search(state: &AppState, req: &SearchRequest) -> ApiResult<SearchResults> {
    Ok(Json(
        state
            .assistant
            .search(&req.query, req.max_results)
            .await?,
    ))
}

pub(crate) async fn summarize_handler(
    State(state): State<AppState>,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<PaperSummary> {
    let Json(req) = body?;
    let options = req.options()?;
    let summarizer = state.assistant.summarizer();

    let paper_id = req.paper_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
    let summary = match (paper_id, req.title.as_deref(), req.content.as_deref()) {
        (Some(id), _, _) => summarizer.summarize_paper(id, options).await?,
        (None, Some(title), Some(content)) => {
            summarizer.summarize_text(title, content, options).await?
        }
        _ => {
            return Err(AssistantError::InvalidInput(
                "provide paper_id, or title and content".into(),
            )
            .into());
        }
    };
    Ok(Json(summary))
}

/// Query-string variant of [`summarize_handler`] for a single paper.
pub(crate) async fn summarize_by_id_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<SummarizeRequest>, QueryRejection>,
) -> ApiResult<PaperSummary> {
    let Query(req) = query?;
    let options = req.options()?;
    Ok(Json(
        state
            .assistant
            .summarizer()
            .summarize_paper(&id, options)
            .await?,
    ))
}

pub(crate) async fn summarize_batch_handler(
    State(state): State<AppState>,
    body: Result<Json<PaperIdsRequest>, JsonRejection>,
) -> ApiResult<Vec<BatchItem<PaperSummary>>> {
    let Json(req) = body?;
    Ok(Json(
        state
            .assistant
            .summarizer()
            .summarize_multiple(&req.paper_ids)
            .await,
    ))
}

pub(crate) async fn paper_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PaperRecord> {
    Ok(Json(state.assistant.paper(&id).await?))
}

pub(crate) async fn cite_handler(
    State(state): State<AppState>,
    body: Result<Json<CiteRequest>, JsonRejection>,
) -> ApiResult<Citation> {
    let Json(req) = body?;
    let style = req.style.as_deref().unwrap_or("apa");
    Ok(Json(
        state.assistant.citations().format(&req.fields, style).await?,
    ))
}

pub(crate) async fn index_handler(
    State(state): State<AppState>,
    body: Result<Json<PaperIdsRequest>, JsonRejection>,
) -> ApiResult<IndexReport> {
    let Json(req) = body?;
    Ok(Json(state.assistant.index_papers(&req.paper_ids).await?))
}

pub(crate) async fn stats_handler(State(state): State<AppState>) -> ApiResult<StoreStats> {
    Ok(Json(state.assistant.stats().await?))
}

pub(crate) async fn route_handler(
    State(state): State<AppState>,
    body: Result<Json<RouteRequest>, JsonRejection>,
) -> ApiResult<RouteDecision> {
    let Json(req) = body?;
    Ok(Json(state.assistant.route(&req.query).await?))
}
