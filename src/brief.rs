use crate::domain::Domain;
use crate::embeddings::Embedder;
use crate::index::VectorIndex;
use crate::profile::{nutrition_query, workout_query, UserProfile};
use crate::retriever::{RetrievalError, Retriever};
use crate::targets::{macros_for, MacroTargets};
use serde::Serialize;

/// Everything the plan writer needs to ground one user's plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundingBrief {
    pub macros: MacroTargets,
    pub workout_query: String,
    pub workout_evidence: Vec<String>,
    pub nutrition_query: String,
    pub nutrition_evidence: Vec<String>,
}

impl GroundingBrief {
    /// Retrieve workout and nutrition passages for `profile`
    pub async fn prepare<E: Embedder, I: VectorIndex>(
        retriever: &Retriever<E, I>,
        profile: &UserProfile,
        top_k: usize,
    ) -> Result<Self, RetrievalError> {
        let workout_query = workout_query(profile);
        let nutrition_query = nutrition_query(profile);

        let workout_evidence = retriever
            .retrieve(Domain::Workout, &workout_query, top_k)
            .await?;
        let nutrition_evidence = retriever
            .retrieve(Domain::Nutrition, &nutrition_query, top_k)
            .await?;

        Ok(GroundingBrief {
            macros: macros_for(profile),
            workout_query,
            workout_evidence,
            nutrition_query,
            nutrition_evidence,
        })
    }
}
