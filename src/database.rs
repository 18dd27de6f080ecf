use crate::domain::Domain;
use crate::embeddings::Embedding;
use crate::index::{Neighbor, VectorIndex};
use anyhow::{Context, Result};
use log::{debug, info};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, ScoredPoint, SearchParams, SearchPoints,
    UpsertPointsBuilder, Value, VectorParams,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

/// Configuration for Qdrant
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl QdrantConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = env::var("QDRANT_URL")?;
        let api_key = env::var("QDRANT_API_KEY").ok();

        Ok(QdrantConfig { url, api_key })
    }
}

/// Create a new Qdrant client
pub fn connect(config: QdrantConfig) -> Result<Arc<Qdrant>> {
    let config_builder = Qdrant::from_url(&config.url);
    let config_builder = if let Some(api_key) = config.api_key {
        config_builder.api_key(api_key)
    } else {
        config_builder
    };

    let client = config_builder
        .build()
        .with_context(|| format!("Failed to connect to Qdrant at {}", config.url))?;

    Ok(Arc::new(client))
}

/// Check if a collection exists
pub async fn collection_exists(client: &Qdrant, collection_name: &str) -> Result<bool> {
    match client.collection_info(collection_name).await {
        Ok(_) => Ok(true),
        Err(qdrant_client::QdrantError::ResponseError { status })
            if status.code() == tonic::Code::NotFound =>
        {
            Ok(false)
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to check collection existence: {}",
            e
        )),
    }
}

/// A domain's vectors kept in a Qdrant collection.
///
/// Point ids are chunk positions, so a hit's id is the line number of its
/// text in the domain's text file. Distances are Euclidean (not squared).
pub struct QdrantIndex {
    client: Arc<Qdrant>,
    collection_name: String,
    next_position: u64,
}

impl QdrantIndex {
    /// Drop any existing collection for `domain` and create an empty one
    pub async fn create(client: Arc<Qdrant>, domain: Domain, dimension: usize) -> Result<Self> {
        let collection_name = domain.collection_name();

        if collection_exists(&client, &collection_name).await? {
            info!("Replacing existing collection {}", collection_name);
            client
                .delete_collection(collection_name.clone())
                .await
                .with_context(|| format!("Failed to delete collection {}", collection_name))?;
        }

        let create_collection = CreateCollectionBuilder::new(collection_name.clone())
            .vectors_config(VectorParams {
                size: dimension as u64,
                distance: Distance::Euclid.into(),
                ..Default::default()
            });

        client
            .create_collection(create_collection)
            .await
            .with_context(|| format!("Failed to create collection {}", collection_name))?;

        Ok(QdrantIndex {
            client,
            collection_name,
            next_position: 0,
        })
    }

    /// Open the existing collection for `domain`; fails when it is missing
    pub async fn open(client: Arc<Qdrant>, domain: Domain) -> Result<Self> {
        let collection_name = domain.collection_name();

        let info = client
            .collection_info(collection_name.clone())
            .await
            .with_context(|| format!("Failed to open collection {}", collection_name))?;
        let next_position = info
            .result
            .and_then(|collection| collection.points_count)
            .unwrap_or(0);
        debug!(
            "Collection {} holds {} points",
            collection_name, next_position
        );

        Ok(QdrantIndex {
            client,
            collection_name,
            next_position,
        })
    }
}

impl VectorIndex for QdrantIndex {
    async fn add(&mut self, vectors: Vec<Embedding>) -> Result<()> {
        let first = self.next_position;
        let count = vectors.len() as u64;

        let points: Vec<PointStruct> = vectors
            .into_iter()
            .enumerate()
            .map(|(offset, embedding)| {
                let position = first + offset as u64;
                let payload: HashMap<String, Value> =
                    HashMap::from([("position".to_string(), Value::from(position as i64))]);
                PointStruct::new(position, embedding.values, payload)
            })
            .collect();

        let upsert_request = UpsertPointsBuilder::new(self.collection_name.clone(), points)
            .wait(true)
            .build();

        self.client
            .upsert_points(upsert_request)
            .await
            .with_context(|| {
                format!(
                    "Failed to upsert points in collection {}",
                    self.collection_name
                )
            })?;

        self.next_position += count;
        Ok(())
    }

    async fn search(&self, query: &Embedding, k: usize) -> Result<Vec<Neighbor>> {
        let search_request = exact_search(&self.collection_name, query, k);

        let search_response = self
            .client
            .search_points(search_request)
            .await
            .with_context(|| format!("Failed to search collection {}", self.collection_name))?;

        search_response
            .result
            .into_iter()
            .map(|scored_point| neighbor_from(&self.collection_name, scored_point))
            .collect()
    }
}

/// Full scan over the collection, bypassing the approximate HNSW graph
fn exact_search(collection_name: &str, query: &Embedding, k: usize) -> SearchPoints {
    SearchPoints {
        collection_name: collection_name.to_string(),
        vector: query.values.clone(),
        limit: k as u64,
        params: Some(SearchParams {
            exact: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn neighbor_from(collection_name: &str, scored_point: ScoredPoint) -> Result<Neighbor> {
    match scored_point.id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Num(position)) => Ok(Neighbor {
            position: position as usize,
            distance: scored_point.score,
        }),
        other => anyhow::bail!(
            "Collection {} returned a non-positional point id: {:?}",
            collection_name,
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::PointId;

    fn scored(id: Option<PointIdOptions>, score: f32) -> ScoredPoint {
        ScoredPoint {
            id: id.map(|options| PointId {
                point_id_options: Some(options),
            }),
            score,
            ..Default::default()
        }
    }

    #[test]
    fn test_search_request_is_exact() {
        let query = Embedding::new(vec![1.0, 0.0, 0.5]);
        let request = exact_search("fitcoach_workout", &query, 5);

        assert_eq!(request.collection_name, "fitcoach_workout");
        assert_eq!(request.vector, vec![1.0, 0.0, 0.5]);
        assert_eq!(request.limit, 5);
        assert_eq!(request.params.and_then(|params| params.exact), Some(true));
    }

    #[test]
    fn test_numeric_id_maps_to_position() {
        let neighbor = neighbor_from("c", scored(Some(PointIdOptions::Num(7)), 0.25)).unwrap();

        assert_eq!(neighbor.position, 7);
        assert_eq!(neighbor.distance, 0.25);
    }

    #[test]
    fn test_uuid_or_missing_id_is_an_error() {
        let uuid = scored(
            Some(PointIdOptions::Uuid(
                "5c56c793-69f3-4fbf-87e6-c4bf54c28c26".to_string(),
            )),
            0.1,
        );
        assert!(neighbor_from("c", uuid).is_err());
        assert!(neighbor_from("c", scored(None, 0.1)).is_err());
    }
}
