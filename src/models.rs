use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user-submitted product request and the anchor for its memes.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Generation {
    pub id: Uuid,
    pub product_name: String,
    pub product_description: String,
    pub product_image_url: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted caption/image/score/safety-flag tuple belonging to a generation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Meme {
    pub meme_id: Uuid,
    pub generation_id: Uuid,
    pub user_id: String,
    pub caption: String,
    pub image_url: String,
    pub virality_score: u8,
    pub is_safe: bool,
    pub safety_flags: Vec<String>,
}
