use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// An independent corpus with its own index; there is no cross-domain search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Workout,
    Nutrition,
}

const WORKOUT_FALLBACK: [&str; 3] = [
    "Progressive overload is key for muscle growth",
    "Compound exercises like squats and deadlifts are most effective",
    "Rest 48-72 hours between training same muscle groups",
];

const NUTRITION_FALLBACK: [&str; 3] = [
    "Protein intake should be 1.6-2.2g per kg bodyweight",
    "Eat in a caloric deficit for fat loss, surplus for muscle gain",
    "Include variety of whole foods for micronutrients",
];

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Workout, Domain::Nutrition];

    pub fn name(self) -> &'static str {
        match self {
            Domain::Workout => "workout",
            Domain::Nutrition => "nutrition",
        }
    }

    /// Generic reference passages served when real retrieval is unavailable
    pub fn fallback(self) -> &'static [&'static str] {
        match self {
            Domain::Workout => &WORKOUT_FALLBACK,
            Domain::Nutrition => &NUTRITION_FALLBACK,
        }
    }

    pub fn fallback_passages(self) -> Vec<String> {
        self.fallback().iter().map(|s| s.to_string()).collect()
    }

    /// Folder under the corpus root holding this domain's source documents
    pub fn source_dir(self, corpus_root: &Path) -> PathBuf {
        match self {
            Domain::Workout => corpus_root.join("workouts"),
            Domain::Nutrition => corpus_root.join("nutrition"),
        }
    }

    pub fn index_path(self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.index", self.name()))
    }

    pub fn text_path(self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.txt", self.name()))
    }

    /// Qdrant collection backing this domain
    pub fn collection_name(self) -> String {
        format!("fitcoach_{}", self.name())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_domain_name() {
        let data = Path::new("data");
        assert_eq!(
            Domain::Workout.index_path(data),
            PathBuf::from("data/workout.index")
        );
        assert_eq!(
            Domain::Nutrition.text_path(data),
            PathBuf::from("data/nutrition.txt")
        );
        assert_eq!(
            Domain::Workout.source_dir(Path::new("pdfs")),
            PathBuf::from("pdfs/workouts")
        );
        assert_eq!(Domain::Nutrition.collection_name(), "fitcoach_nutrition");
    }

    #[test]
    fn test_every_domain_has_fallback_passages() {
        for domain in Domain::ALL {
            assert!(!domain.fallback().is_empty());
            assert_eq!(domain.fallback_passages().len(), domain.fallback().len());
        }
        assert_ne!(Domain::Workout.fallback(), Domain::Nutrition.fallback());
    }
}
