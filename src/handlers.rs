use crate::{
    AppState,
    errors::AppError,
    models::{Generation, Meme},
    pipeline::{GeneratedMeme, TrendingTopic},
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing;
use uuid::Uuid;

/// History responses are capped at the caller's 20 most recent generations.
const HISTORY_LIMIT: usize = 20;

/// Header carrying the caller's identity on read endpoints. A real deployment
/// would resolve this from an auth provider; identity plumbing is out of scope.
const USER_ID_HEADER: &str = "x-user-id";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateMemesResponse {
    generation_id: Uuid,
    memes: Vec<GeneratedMeme>,
    trending_topics: Vec<TrendingTopic>,
    message: String,
}

#[derive(Serialize)]
struct GenerationDetailResponse {
    generation: Generation,
    memes: Vec<Meme>,
}

#[derive(Serialize)]
struct HistoryEntry {
    #[serde(flatten)]
    generation: Generation,
    meme_count: usize,
}

#[derive(Serialize)]
struct HistoryResponse {
    generations: Vec<HistoryEntry>,
}

fn caller_user_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
}

/// Uploaded image bytes are acknowledged but never stored; the generation
/// records a placeholder URL derived from the product name instead.
fn placeholder_image_url(product_name: &str) -> String {
    let query = format!("{product_name} product image").replace(' ', "+");
    format!("/placeholder.svg?height=400&width=400&query={query}")
}

/// Handler for POST /api/generate-memes.
pub async fn generate_memes(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut product_name: Option<String> = None;
    let mut product_description: Option<String> = None;
    let mut user_id: Option<String> = None;
    let mut has_product_image = false;

    while let Some(field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        match field_name.as_str() {
            "productName" => product_name = Some(field.text().await?),
            "productDescription" => product_description = Some(field.text().await?),
            "userId" => user_id = Some(field.text().await?),
            "productImage" => {
                has_product_image = !field.bytes().await?.is_empty();
            }
            _ => tracing::debug!("Ignoring unknown multipart field: {}", field_name),
        }
    }

    let product_name = product_name
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::MissingFormField("productName".to_string()))?;
    let product_description = product_description
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::MissingFormField("productDescription".to_string()))?;
    let user_id = user_id
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Unauthorized("User authentication required".to_string()))?;

    tracing::info!(%product_name, %user_id, "Received meme generation request");

    let product_image_url = has_product_image.then(|| placeholder_image_url(&product_name));

    let output = state
        .pipeline
        .run(&product_name, &product_description)
        .await;

    let generation = Generation {
        id: Uuid::new_v4(),
        product_name,
        product_description,
        product_image_url,
        user_id: user_id.clone(),
        created_at: Utc::now(),
    };
    state.generation_repo.create(&generation).await?;

    let meme_rows: Vec<Meme> = output
        .memes
        .iter()
        .map(|meme| Meme {
            meme_id: Uuid::new_v4(),
            generation_id: generation.id,
            user_id: user_id.clone(),
            caption: meme.caption.clone(),
            image_url: meme.image_url.clone(),
            virality_score: meme.virality_score,
            is_safe: meme.is_safe,
            safety_flags: meme.safety_flags.clone(),
        })
        .collect();
    state.meme_repo.create_batch(&meme_rows).await?;

    tracing::info!(generation_id = %generation.id, "Generation saved successfully");

    Ok(Json(GenerateMemesResponse {
        generation_id: generation.id,
        memes: output.memes,
        trending_topics: output.trending_topics,
        message: "Memes generated successfully!".to_string(),
    }))
}

/// Handler for GET /api/generations/{id}. Owner-only access.
pub async fn get_generation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = caller_user_id(&headers)?;
    let generation_id = Uuid::parse_str(&id_str)?;
    tracing::debug!(%generation_id, "Fetching generation details via handler");

    let generation = state
        .generation_repo
        .get_by_id(generation_id)
        .await?
        .ok_or(AppError::GenerationNotFound(generation_id))?;

    if generation.user_id != user_id {
        tracing::warn!(%generation_id, "Caller does not own requested generation");
        return Err(AppError::Forbidden);
    }

    let memes = state.meme_repo.list_by_generation(generation_id).await?;
    Ok(Json(GenerationDetailResponse { generation, memes }))
}

/// Handler for GET /api/history: the caller's recent generations with counts.
pub async fn history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let user_id = caller_user_id(&headers)?;
    tracing::debug!(%user_id, "Fetching generation history via handler");

    let generations = state
        .generation_repo
        .list_by_user(&user_id, HISTORY_LIMIT)
        .await?;

    let mut entries = Vec::with_capacity(generations.len());
    for generation in generations {
        let meme_count = state.meme_repo.count_by_generation(generation.id).await?;
        entries.push(HistoryEntry {
            generation,
            meme_count,
        });
    }

    tracing::info!(%user_id, "Handler retrieved {} history entries", entries.len());
    Ok(Json(HistoryResponse {
        generations: entries,
    }))
}

/// Handler for GET /health.
pub async fn health() -> &'static str {
    "OK"
}
