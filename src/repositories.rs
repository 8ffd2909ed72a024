use crate::{
    domain::{GenerationRepository, MemeRepository},
    errors::RepoError,
    models::{Generation, Meme},
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    Client as DynamoDbClient,
    types::{AttributeValue, Select},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{self, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DynamoDbGenerationRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbGenerationRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbGenerationRepository");
        Self { client, table_name }
    }
}

#[async_trait]
impl GenerationRepository for DynamoDbGenerationRepository {
    /// Stores a `Generation` in the DynamoDB table using PutItem.
    async fn create(&self, generation: &Generation) -> Result<(), RepoError> {
        let mut request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item("id", AttributeValue::S(generation.id.to_string()))
            .item(
                "product_name",
                AttributeValue::S(generation.product_name.clone()),
            )
            .item(
                "product_description",
                AttributeValue::S(generation.product_description.clone()),
            )
            .item("user_id", AttributeValue::S(generation.user_id.clone()))
            .item(
                "created_at",
                AttributeValue::S(generation.created_at.to_rfc3339()),
            );
        // product_image_url is optional; absent means no image was submitted
        if let Some(url) = &generation.product_image_url {
            request = request.item("product_image_url", AttributeValue::S(url.clone()));
        }

        request
            .send()
            .await
            .context(format!(
                "DynamoDB (table: {}): Failed to put generation (id: {})",
                self.table_name, generation.id
            ))
            .map_err(RepoError::BackendError)?;
        Ok(())
    }

    /// Retrieves a `Generation` from DynamoDB using GetItem.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Generation>, RepoError> {
        let id_str = id.to_string();
        let resp = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(id_str.clone()))
            .send()
            .await
            .context(format!(
                "DynamoDB (table: {}): Failed to get generation (id: {})",
                self.table_name, id_str
            ))
            .map_err(RepoError::BackendError)?;

        match resp.item {
            Some(item) => match item_to_generation(&item) {
                Some(generation) => Ok(Some(generation)),
                None => {
                    tracing::error!(generation_id = %id_str, table_name = %self.table_name, "DynamoDB: Retrieved item but failed to parse into Generation");
                    Err(RepoError::DataCorruption(format!(
                        "Failed to parse generation data retrieved from DynamoDB table '{}' for id {}",
                        self.table_name, id_str
                    )))
                }
            },
            None => Ok(None), // Item not found is not an error
        }
    }

    /// Lists a user's generations via a filtered Scan. Handles pagination,
    /// then sorts newest-first and applies the limit in memory.
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Generation>, RepoError> {
        tracing::debug!(%user_id, "DynamoDB: Scanning table '{}' for user generations", self.table_name);
        let mut generations: Vec<Generation> = Vec::new();
        let mut last_evaluated_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut request_builder = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("user_id = :uid")
                .expression_attribute_values(":uid", AttributeValue::S(user_id.to_string()));

            if let Some(lek) = last_evaluated_key {
                request_builder = request_builder.set_exclusive_start_key(Some(lek));
            }

            let resp = request_builder
                .send()
                .await
                .context(format!(
                    "DynamoDB: Failed to scan table '{}'",
                    self.table_name
                ))
                .map_err(RepoError::BackendError)?;

            if let Some(items) = resp.items {
                for item in items {
                    match item_to_generation(&item) {
                        Some(generation) => generations.push(generation),
                        None => {
                            let item_id = item.get("id").and_then(|v| v.as_s().ok());
                            tracing::error!(item.id = ?item_id, table_name = %self.table_name, "DynamoDB: Failed to parse item from scan into Generation");
                            return Err(RepoError::DataCorruption(format!(
                                "DynamoDB: Failed to parse item {:?} during scan of table '{}'",
                                item_id, self.table_name
                            )));
                        }
                    }
                }
            }

            last_evaluated_key = resp.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
        }

        generations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        generations.truncate(limit);

        tracing::info!(%user_id, "DynamoDB (table: {}): Listed {} generations", self.table_name, generations.len());
        Ok(generations)
    }
}

#[derive(Debug, Clone)]
pub struct DynamoDbMemeRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDbMemeRepository {
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbMemeRepository");
        Self { client, table_name }
    }

    fn scan_by_generation(
        &self,
        generation_id: Uuid,
    ) -> aws_sdk_dynamodb::operation::scan::builders::ScanFluentBuilder {
        self.client
            .scan()
            .table_name(&self.table_name)
            .filter_expression("generation_id = :gid")
            .expression_attribute_values(":gid", AttributeValue::S(generation_id.to_string()))
    }
}

#[async_trait]
impl MemeRepository for DynamoDbMemeRepository {
    /// Stores each `Meme` with PutItem. The batch is small (three rows per
    /// generation) so sequential puts are fine.
    async fn create_batch(&self, memes: &[Meme]) -> Result<(), RepoError> {
        for meme in memes {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .item("meme_id", AttributeValue::S(meme.meme_id.to_string()))
                .item(
                    "generation_id",
                    AttributeValue::S(meme.generation_id.to_string()),
                )
                .item("user_id", AttributeValue::S(meme.user_id.clone()))
                .item("caption", AttributeValue::S(meme.caption.clone()))
                .item("image_url", AttributeValue::S(meme.image_url.clone()))
                .item(
                    "virality_score",
                    AttributeValue::N(meme.virality_score.to_string()),
                )
                .item("is_safe", AttributeValue::Bool(meme.is_safe))
                .item(
                    "safety_flags",
                    AttributeValue::L(
                        meme.safety_flags
                            .iter()
                            .map(|flag| AttributeValue::S(flag.clone()))
                            .collect(),
                    ),
                )
                .send()
                .await
                .context(format!(
                    "DynamoDB (table: {}): Failed to put meme (id: {})",
                    self.table_name, meme.meme_id
                ))
                .map_err(RepoError::BackendError)?;
        }
        Ok(())
    }

    /// Lists a generation's memes via a filtered Scan. Handles pagination.
    async fn list_by_generation(&self, generation_id: Uuid) -> Result<Vec<Meme>, RepoError> {
        tracing::debug!(%generation_id, "DynamoDB: Scanning table '{}' for memes", self.table_name);
        let mut memes: Vec<Meme> = Vec::new();
        let mut last_evaluated_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut request_builder = self.scan_by_generation(generation_id);

            if let Some(lek) = last_evaluated_key {
                request_builder = request_builder.set_exclusive_start_key(Some(lek));
            }

            let resp = request_builder
                .send()
                .await
                .context(format!(
                    "DynamoDB: Failed to scan table '{}'",
                    self.table_name
                ))
                .map_err(RepoError::BackendError)?;

            if let Some(items) = resp.items {
                for item in items {
                    match item_to_meme(&item) {
                        Some(meme) => memes.push(meme),
                        None => {
                            let item_id = item.get("meme_id").and_then(|v| v.as_s().ok());
                            tracing::error!(item.id = ?item_id, table_name = %self.table_name, "DynamoDB: Failed to parse item from scan into Meme");
                            return Err(RepoError::DataCorruption(format!(
                                "DynamoDB: Failed to parse item {:?} during scan of table '{}'",
                                item_id, self.table_name
                            )));
                        }
                    }
                }
            }

            last_evaluated_key = resp.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
        }

        Ok(memes)
    }

    /// Counts a generation's memes with a Select::Count scan.
    async fn count_by_generation(&self, generation_id: Uuid) -> Result<usize, RepoError> {
        let mut count: usize = 0;
        let mut last_evaluated_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut request_builder = self.scan_by_generation(generation_id).select(Select::Count);

            if let Some(lek) = last_evaluated_key {
                request_builder = request_builder.set_exclusive_start_key(Some(lek));
            }

            let resp = request_builder
                .send()
                .await
                .context(format!(
                    "DynamoDB: Failed to count memes in table '{}'",
                    self.table_name
                ))
                .map_err(RepoError::BackendError)?;

            count += resp.count() as usize;

            last_evaluated_key = resp.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
        }

        Ok(count)
    }
}

// Helper functions to convert DynamoDB item maps into records.
// Remain internal to this module.

fn item_to_generation(item: &HashMap<String, AttributeValue>) -> Option<Generation> {
    let id = item
        .get("id")?
        .as_s()
        .ok()
        .and_then(|s| Uuid::parse_str(s).ok())?;
    let product_name = item.get("product_name")?.as_s().ok()?.to_string();
    let product_description = item.get("product_description")?.as_s().ok()?.to_string();
    let user_id = item.get("user_id")?.as_s().ok()?.to_string();
    let created_at = item
        .get("created_at")?
        .as_s()
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))?;
    let product_image_url = match item.get("product_image_url") {
        Some(value) => Some(value.as_s().ok()?.to_string()),
        None => None,
    };

    Some(Generation {
        id,
        product_name,
        product_description,
        product_image_url,
        user_id,
        created_at,
    })
}

fn item_to_meme(item: &HashMap<String, AttributeValue>) -> Option<Meme> {
    let meme_id = item
        .get("meme_id")?
        .as_s()
        .ok()
        .and_then(|s| Uuid::parse_str(s).ok())?;
    let generation_id = item
        .get("generation_id")?
        .as_s()
        .ok()
        .and_then(|s| Uuid::parse_str(s).ok())?;
    let user_id = item.get("user_id")?.as_s().ok()?.to_string();
    let caption = item.get("caption")?.as_s().ok()?.to_string();
    let image_url = item.get("image_url")?.as_s().ok()?.to_string();
    let virality_score = item
        .get("virality_score")?
        .as_n()
        .ok()
        .and_then(|n| n.parse::<u8>().ok())?;
    let is_safe = *item.get("is_safe")?.as_bool().ok()?;
    let safety_flags = item
        .get("safety_flags")?
        .as_l()
        .ok()?
        .iter()
        .map(|value| value.as_s().ok().map(|s| s.to_string()))
        .collect::<Option<Vec<String>>>()?;

    Some(Meme {
        meme_id,
        generation_id,
        user_id,
        caption,
        image_url,
        virality_score,
        is_safe,
        safety_flags,
    })
}
