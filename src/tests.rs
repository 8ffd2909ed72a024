//! Integration tests for the meme generation backend.
//!
//! The router is spawned on an ephemeral port and driven over HTTP with
//! reqwest. The DynamoDB repositories are replaced with in-memory fakes
//! implementing the same domain traits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

use crate::AppState;
use crate::domain::{GenerationRepository, MemeRepository};
use crate::errors::RepoError;
use crate::models::{Generation, Meme};
use crate::pipeline::MemePipeline;
use crate::routes::create_router;

#[derive(Default)]
struct InMemoryGenerationRepository {
    rows: Mutex<HashMap<Uuid, Generation>>,
}

#[async_trait]
impl GenerationRepository for InMemoryGenerationRepository {
    async fn create(&self, generation: &Generation) -> Result<(), RepoError> {
        self.rows
            .lock()
            .unwrap()
            .insert(generation.id, generation.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Generation>, RepoError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Generation>, RepoError> {
        let mut generations: Vec<Generation> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|generation| generation.user_id == user_id)
            .cloned()
            .collect();
        generations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        generations.truncate(limit);
        Ok(generations)
    }
}

#[derive(Default)]
struct InMemoryMemeRepository {
    rows: Mutex<Vec<Meme>>,
}

#[async_trait]
impl MemeRepository for InMemoryMemeRepository {
    async fn create_batch(&self, memes: &[Meme]) -> Result<(), RepoError> {
        self.rows.lock().unwrap().extend_from_slice(memes);
        Ok(())
    }

    async fn list_by_generation(&self, generation_id: Uuid) -> Result<Vec<Meme>, RepoError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|meme| meme.generation_id == generation_id)
            .cloned()
            .collect())
    }

    async fn count_by_generation(&self, generation_id: Uuid) -> Result<usize, RepoError> {
        Ok(self.list_by_generation(generation_id).await?.len())
    }
}

/// Test fixture spawning the service with in-memory repositories.
struct TestFixture {
    client: Client,
    base_url: String,
    generation_repo: Arc<InMemoryGenerationRepository>,
}

impl TestFixture {
    async fn new() -> Self {
        let generation_repo = Arc::new(InMemoryGenerationRepository::default());

        let state = Arc::new(AppState {
            generation_repo: generation_repo.clone(),
            meme_repo: Arc::new(InMemoryMemeRepository::default()),
            pipeline: MemePipeline::instant(),
        });
        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestFixture {
            client: Client::new(),
            base_url,
            generation_repo,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn generate(&self, product_name: &str, user_id: &str) -> reqwest::Response {
        let form = reqwest::multipart::Form::new()
            .text("productName", product_name.to_string())
            .text("productDescription", "It mops, robotically".to_string())
            .text("userId", user_id.to_string());
        self.client
            .post(self.url("/api/generate-memes"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    /// Seeds a generation directly, bypassing the pipeline.
    async fn seed_generation(&self, user_id: &str) -> Uuid {
        let generation = Generation {
            id: Uuid::new_v4(),
            product_name: "RoboMop".to_string(),
            product_description: "It mops, robotically".to_string(),
            product_image_url: None,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        self.generation_repo.create(&generation).await.unwrap();
        generation.id
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_generate_returns_scored_memes() {
    let fixture = TestFixture::new().await;

    let resp = fixture.generate("RoboMop", "user-1").await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert!(body["generationId"].as_str().is_some());
    assert_eq!(body["message"], "Memes generated successfully!");
    assert_eq!(body["trendingTopics"].as_array().unwrap().len(), 5);

    let memes = body["memes"].as_array().unwrap();
    assert!(!memes.is_empty());
    for meme in memes {
        let score = meme["viralityScore"].as_u64().unwrap();
        assert!(score <= 100, "virality score out of range: {score}");
        assert!(meme["caption"].as_str().unwrap().contains("RoboMop"));
        assert!(meme["isSafe"].as_bool().unwrap());
        assert!(meme["safetyFlags"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_generate_missing_product_name_is_rejected() {
    let fixture = TestFixture::new().await;

    let form = reqwest::multipart::Form::new()
        .text("productDescription", "It mops, robotically")
        .text("userId", "user-1");
    let resp = fixture
        .client
        .post(fixture.url("/api/generate-memes"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("productName"));
}

#[tokio::test]
async fn test_generate_missing_description_is_rejected() {
    let fixture = TestFixture::new().await;

    let form = reqwest::multipart::Form::new()
        .text("productName", "RoboMop")
        .text("userId", "user-1");
    let resp = fixture
        .client
        .post(fixture.url("/api/generate-memes"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_generate_missing_user_id_is_unauthorized() {
    let fixture = TestFixture::new().await;

    let form = reqwest::multipart::Form::new()
        .text("productName", "RoboMop")
        .text("productDescription", "It mops, robotically");
    let resp = fixture
        .client
        .post(fixture.url("/api/generate-memes"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_get_generation_roundtrip() {
    let fixture = TestFixture::new().await;

    let body: Value = fixture
        .generate("RoboMop", "user-1")
        .await
        .json()
        .await
        .unwrap();
    let generation_id = body["generationId"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/generations/{generation_id}")))
        .header("x-user-id", "user-1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let detail: Value = resp.json().await.unwrap();
    assert_eq!(detail["generation"]["product_name"], "RoboMop");
    assert_eq!(detail["generation"]["user_id"], "user-1");

    let memes = detail["memes"].as_array().unwrap();
    assert_eq!(memes.len(), body["memes"].as_array().unwrap().len());
    for meme in memes {
        assert_eq!(meme["generation_id"].as_str().unwrap(), generation_id);
        let score = meme["virality_score"].as_u64().unwrap();
        assert!(score <= 100);
    }
}

#[tokio::test]
async fn test_get_generation_requires_identity() {
    let fixture = TestFixture::new().await;
    let id = fixture.seed_generation("alice").await;

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/generations/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_get_foreign_generation_is_forbidden() {
    let fixture = TestFixture::new().await;
    let id = fixture.seed_generation("alice").await;

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/generations/{id}")))
        .header("x-user-id", "bob")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_get_unknown_generation_is_not_found() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/generations/{}", Uuid::new_v4())))
        .header("x-user-id", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_get_malformed_generation_id_is_bad_request() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/generations/not-a-uuid"))
        .header("x-user-id", "alice")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_history_requires_identity() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/history"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_history_lists_own_generations_with_counts() {
    let fixture = TestFixture::new().await;

    fixture.generate("RoboMop", "user-1").await;
    fixture.generate("TurboKettle", "user-1").await;
    fixture.generate("OtherThing", "user-2").await;

    let resp = fixture
        .client
        .get(fixture.url("/api/history"))
        .header("x-user-id", "user-1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let generations = body["generations"].as_array().unwrap();
    assert_eq!(generations.len(), 2);
    // Newest first
    assert_eq!(generations[0]["product_name"], "TurboKettle");
    assert_eq!(generations[1]["product_name"], "RoboMop");
    for generation in generations {
        assert_eq!(generation["meme_count"].as_u64().unwrap(), 3);
        assert_eq!(generation["user_id"], "user-1");
    }
}
