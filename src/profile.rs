use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    /// Any other value; computed like `Female`
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    FatLoss,
    MuscleGain,
    Maintenance,
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Goal::FatLoss => "fat_loss",
            Goal::MuscleGain => "muscle_gain",
            Goal::Maintenance => "maintenance",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Sedentary,
    Light,
    Moderate,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GymAccess {
    #[default]
    FullGym,
    HomeGym,
    NoGym,
    BodyweightOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookingAbility {
    #[default]
    CanCook,
    LimitedCooking,
    NoCooking,
}

/// What the coach knows about a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: u32,
    /// Kilograms
    pub weight: f64,
    /// Centimetres
    pub height: f64,
    pub gender: Gender,
    pub goal: Goal,
    pub activity: Activity,
    #[serde(default)]
    pub diet: Option<String>,
    #[serde(default)]
    pub gym_access: GymAccess,
    #[serde(default, rename = "equipment_available")]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub cooking_ability: CookingAbility,
    #[serde(default = "default_living_situation")]
    pub living_situation: String,
}

fn default_living_situation() -> String {
    "home".to_string()
}

impl UserProfile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse profile {}", path.display()))
    }

    fn cannot_cook(&self) -> bool {
        self.cooking_ability == CookingAbility::NoCooking || self.living_situation == "hostel"
    }
}

/// Retrieval query for the workout corpus, shaped by gym access and equipment
pub fn workout_query(profile: &UserProfile) -> String {
    let mut query = format!("best workout for {}", profile.goal);

    match profile.gym_access {
        GymAccess::NoGym | GymAccess::BodyweightOnly => {
            query.push_str(" calisthenics bodyweight home workout")
        }
        GymAccess::HomeGym => query.push_str(" home gym limited equipment"),
        GymAccess::FullGym => {}
    }

    if !profile.equipment.is_empty() {
        query.push_str(" using ");
        query.push_str(&profile.equipment.join(" "));
    }

    query
}

/// Retrieval query for the nutrition corpus, shaped by diet and cooking constraints
pub fn nutrition_query(profile: &UserProfile) -> String {
    let mut query = format!(
        "nutrition for {} {}",
        profile.goal,
        profile.diet.as_deref().unwrap_or("")
    );

    if profile.cannot_cook() {
        query.push_str(" no cook meals hostel nutrition");
    } else if profile.cooking_ability == CookingAbility::LimitedCooking {
        query.push_str(" minimal cooking simple meals");
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(extra: serde_json::Value) -> UserProfile {
        let mut base = json!({
            "age": 25,
            "weight": 80.0,
            "height": 175.0,
            "gender": "male",
            "goal": "muscle_gain",
            "activity": "moderate"
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).expect("profile should deserialize")
    }

    #[test]
    fn test_defaults_apply_to_minimal_profile() {
        let p = profile(json!({}));
        assert_eq!(p.gym_access, GymAccess::FullGym);
        assert_eq!(p.cooking_ability, CookingAbility::CanCook);
        assert_eq!(p.living_situation, "home");
        assert!(p.equipment.is_empty());
        assert_eq!(workout_query(&p), "best workout for muscle_gain");
        assert_eq!(nutrition_query(&p), "nutrition for muscle_gain ");
    }

    #[test]
    fn test_workout_query_reflects_gym_and_equipment() {
        let p = profile(json!({
            "gym_access": "no_gym",
            "equipment_available": ["pull-up bar", "bands"]
        }));
        assert_eq!(
            workout_query(&p),
            "best workout for muscle_gain calisthenics bodyweight home workout using pull-up bar bands"
        );

        let p = profile(json!({ "goal": "fat_loss", "gym_access": "home_gym" }));
        assert_eq!(
            workout_query(&p),
            "best workout for fat_loss home gym limited equipment"
        );
    }

    #[test]
    fn test_nutrition_query_reflects_cooking_constraints() {
        let p = profile(json!({ "diet": "vegetarian", "living_situation": "hostel" }));
        assert_eq!(
            nutrition_query(&p),
            "nutrition for muscle_gain vegetarian no cook meals hostel nutrition"
        );

        let p = profile(json!({ "diet": "vegan", "cooking_ability": "limited_cooking" }));
        assert_eq!(
            nutrition_query(&p),
            "nutrition for muscle_gain vegan minimal cooking simple meals"
        );
    }

    #[test]
    fn test_profile_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.json");
        fs::write(
            &path,
            r#"{"age": 31, "weight": 62.5, "height": 165, "gender": "female",
                "goal": "fat_loss", "activity": "light", "diet": "pescatarian"}"#,
        )
        .unwrap();

        let p = UserProfile::from_file(&path).expect("profile should load");

        assert_eq!(p.gender, Gender::Female);
        assert_eq!(p.activity, Activity::Light);
        assert_eq!(p.diet.as_deref(), Some("pescatarian"));
    }

    #[test]
    fn test_unlisted_gender_still_deserializes() {
        for gender in ["other", "nonbinary"] {
            let p = profile(json!({ "gender": gender }));
            assert_eq!(p.gender, Gender::Other);
        }
    }
}
