use crate::errors::RepoError;
use crate::models::{Generation, Meme};
use async_trait::async_trait;
use uuid::Uuid;

/// Trait defining operations for storing and retrieving generation records.
#[async_trait]
pub trait GenerationRepository: Send + Sync + 'static {
    /// Persists a new generation record.
    async fn create(&self, generation: &Generation) -> Result<(), RepoError>;

    /// Retrieves a generation by its unique ID.
    /// Returns Ok(None) if the generation is not found.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Generation>, RepoError>;

    /// Lists a user's generations, newest first, capped at `limit`.
    async fn list_by_user(&self, user_id: &str, limit: usize) -> Result<Vec<Generation>, RepoError>;
}

/// Trait defining operations for storing and retrieving meme records.
#[async_trait]
pub trait MemeRepository: Send + Sync + 'static {
    /// Persists the memes produced by one generation.
    async fn create_batch(&self, memes: &[Meme]) -> Result<(), RepoError>;

    /// Lists every meme belonging to a generation.
    async fn list_by_generation(&self, generation_id: Uuid) -> Result<Vec<Meme>, RepoError>;

    /// Counts the memes belonging to a generation.
    async fn count_by_generation(&self, generation_id: Uuid) -> Result<usize, RepoError>;
}
