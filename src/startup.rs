use crate::config::Config;
use crate::errors::AppError;
use aws_sdk_dynamodb::{
    Client as DynamoDbClient,
    error::SdkError,
    types::{AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType},
};
use tracing;

/// Creates a DynamoDB table with a single string partition key, if it doesn't
/// already exist.
async fn create_table_if_not_exists(
    client: &DynamoDbClient,
    table_name: &str,
    partition_key: &str,
) -> Result<(), AppError> {
    let result = client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(partition_key)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(|e| {
                    AppError::InitError(format!("Failed to build attribute definition: {}", e))
                })?,
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name(partition_key)
                .key_type(KeyType::Hash)
                .build()
                .map_err(|e| AppError::InitError(format!("Failed to build key schema: {}", e)))?,
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await;

    match result {
        Ok(_) => {
            tracing::info!(
                "Startup: Table '{}' created successfully or setup initiated.",
                table_name
            );
            Ok(())
        }
        Err(e) => {
            if let SdkError::ServiceError(service_err) = &e {
                if service_err.err().is_resource_in_use_exception() {
                    tracing::info!(
                        "Startup: Table '{}' already exists, no action needed.",
                        table_name
                    );
                    Ok(())
                } else {
                    let context =
                        format!("Startup: Service error creating DynamoDB table '{}'", table_name);
                    tracing::error!("{}: {:?}", context, service_err);
                    Err(AppError::InitError(format!("{}: {}", context, e)))
                }
            } else {
                let context = format!("Startup: SDK error creating DynamoDB table '{}'", table_name);
                tracing::error!("{}: {}", context, e);
                Err(AppError::InitError(format!("{}: {}", context, e)))
            }
        }
    }
}

/// Initializes the DynamoDB tables backing the service.
pub async fn init_resources(client: &DynamoDbClient, config: &Config) -> Result<(), AppError> {
    tracing::info!("Startup: Initializing DynamoDB tables...");
    create_table_if_not_exists(client, &config.generations_table, "id").await?;
    create_table_if_not_exists(client, &config.memes_table, "meme_id").await?;
    tracing::info!("Startup: Table initialization complete.");
    Ok(())
}
