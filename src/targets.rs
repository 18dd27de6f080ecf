use crate::profile::{Activity, Gender, Goal, UserProfile};
use serde::{Deserialize, Serialize};

/// Daily calorie and macronutrient targets, rounded to whole units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroTargets {
    pub calories: i64,
    /// Grams
    pub protein: i64,
    pub fats: i64,
    pub carbs: i64,
}

impl Activity {
    pub fn multiplier(self) -> f64 {
        match self {
            Activity::Sedentary => 1.2,
            Activity::Light => 1.375,
            Activity::Moderate => 1.55,
            Activity::Active => 1.725,
        }
    }
}

/// Mifflin-St Jeor basal metabolic rate in kcal/day
pub fn basal_metabolic_rate(weight_kg: f64, height_cm: f64, age: u32, gender: Gender) -> f64 {
    let offset = match gender {
        Gender::Male => 5.0,
        Gender::Female | Gender::Other => -161.0,
    };
    10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age) + offset
}

pub fn calculate_macros(
    weight_kg: f64,
    height_cm: f64,
    age: u32,
    gender: Gender,
    goal: Goal,
    activity: Activity,
) -> MacroTargets {
    let mut tdee = basal_metabolic_rate(weight_kg, height_cm, age, gender) * activity.multiplier();
    match goal {
        Goal::FatLoss => tdee -= 500.0,
        Goal::MuscleGain => tdee += 300.0,
        Goal::Maintenance => {}
    }

    let protein = weight_kg * 1.8;
    let fat = 0.25 * tdee / 9.0;
    let carbs = (tdee - (protein * 4.0 + fat * 9.0)) / 4.0;

    MacroTargets {
        calories: round(tdee),
        protein: round(protein),
        fats: round(fat),
        carbs: round(carbs),
    }
}

pub fn macros_for(profile: &UserProfile) -> MacroTargets {
    calculate_macros(
        profile.weight,
        profile.height,
        profile.age,
        profile.gender,
        profile.goal,
        profile.activity,
    )
}

/// Round half to even
fn round(value: f64) -> i64 {
    value.round_ties_even() as i64
}
