use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::fields::FieldKey;

/// Flat wire shape of the answers: field key → JSON value. Unset fields are
/// `null` so a cleared field diffs against its previous value.
pub type FieldMap = BTreeMap<String, Value>;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Goal {
    FinishRace,
    ImproveRaceTime,
    MaintainFitness,
    LoseWeight,
    Other,
}

impl Goal {
    /// Goals that open the race-details step.
    pub fn race_goal(self) -> Option<RaceGoal> {
        match self {
            Self::FinishRace => Some(RaceGoal::FinishRace),
            Self::ImproveRaceTime => Some(RaceGoal::ImproveRaceTime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceGoal {
    FinishRace,
    ImproveRaceTime,
}

impl RaceGoal {
    pub fn as_goal(self) -> Goal {
        match self {
            Self::FinishRace => Goal::FinishRace,
            Self::ImproveRaceTime => Goal::ImproveRaceTime,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RaceDistance {
    #[serde(rename = "5k")]
    #[strum(serialize = "5k")]
    FiveK,
    #[serde(rename = "10k")]
    #[strum(serialize = "10k")]
    TenK,
    HalfMarathon,
    Marathon,
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Injury {
    Knee,
    Shin,
    Ankle,
    Hip,
    Back,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentRun {
    pub distance_km: f64,
    pub duration_minutes: u32,
}

impl RecentRun {
    pub fn is_valid(&self) -> bool {
        self.distance_km.is_finite() && self.distance_km > 0.0 && self.duration_minutes > 0
    }
}

/// Details that only exist while a race goal is selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceDetails {
    #[serde(default)]
    pub distance: Option<RaceDistance>,
    #[serde(default)]
    pub distance_other: Option<String>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    /// Target finish time in seconds; only kept for `ImproveRaceTime`.
    #[serde(default)]
    pub target_finish_time: Option<u32>,
}

/// The branch field. Race details are carried inside the race variant, so a
/// non-race goal cannot hold orphaned race data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GoalAnswer {
    Race {
        goal: RaceGoal,
        #[serde(default)]
        details: RaceDetails,
    },
    MaintainFitness,
    LoseWeight,
    Other {
        #[serde(default)]
        detail: Option<String>,
    },
}

impl GoalAnswer {
    pub fn fresh(goal: Goal) -> Self {
        match goal {
            Goal::FinishRace => Self::Race {
                goal: RaceGoal::FinishRace,
                details: RaceDetails::default(),
            },
            Goal::ImproveRaceTime => Self::Race {
                goal: RaceGoal::ImproveRaceTime,
                details: RaceDetails::default(),
            },
            Goal::MaintainFitness => Self::MaintainFitness,
            Goal::LoseWeight => Self::LoseWeight,
            Goal::Other => Self::Other { detail: None },
        }
    }

    pub fn goal(&self) -> Goal {
        match self {
            Self::Race { goal, .. } => goal.as_goal(),
            Self::MaintainFitness => Goal::MaintainFitness,
            Self::LoseWeight => Goal::LoseWeight,
            Self::Other { .. } => Goal::Other,
        }
    }

    pub fn race(&self) -> Option<(RaceGoal, &RaceDetails)> {
        match self {
            Self::Race { goal, details } => Some((*goal, details)),
            _ => None,
        }
    }
}

/// Questionnaire answers, one optional field per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Answers {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub goal: Option<GoalAnswer>,
    #[serde(default)]
    pub training_days: Vec<Weekday>,
    #[serde(default)]
    pub long_run_day: Option<Weekday>,
    #[serde(default)]
    pub recent_runs: Vec<RecentRun>,
    #[serde(default)]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default)]
    pub injuries: Vec<Injury>,
    #[serde(default)]
    pub injury_other: Option<String>,
}

impl Answers {
    pub fn race(&self) -> Option<(RaceGoal, &RaceDetails)> {
        self.goal.as_ref().and_then(GoalAnswer::race)
    }

    pub fn race_details_mut(&mut self) -> Option<&mut RaceDetails> {
        match self.goal.as_mut() {
            Some(GoalAnswer::Race { details, .. }) => Some(details),
            _ => None,
        }
    }

    /// Flatten into the wire payload. Every key is present.
    pub fn to_fields(&self) -> FieldMap {
        let mut map = FieldMap::new();
        for key in FieldKey::ALL {
            map.insert(key.as_ref().to_string(), self.field_value(key));
        }
        map
    }

    pub fn field_value(&self, key: FieldKey) -> Value {
        let race = self.race().map(|(_, details)| details);
        match key {
            FieldKey::Name => json!(self.name),
            FieldKey::Email => json!(self.email),
            FieldKey::Goal => json!(self.goal.as_ref().map(|g| g.goal().to_string())),
            FieldKey::GoalOther => match &self.goal {
                Some(GoalAnswer::Other { detail }) => json!(detail),
                _ => Value::Null,
            },
            FieldKey::RaceDistance => json!(race.and_then(|d| d.distance)),
            FieldKey::RaceDistanceOther => json!(race.and_then(|d| d.distance_other.clone())),
            FieldKey::TargetRaceDate => {
                json!(race.and_then(|d| d.target_date).map(|d| d.to_string()))
            }
            FieldKey::TargetFinishTime => json!(race.and_then(|d| d.target_finish_time)),
            FieldKey::TrainingDays => json!(self.training_days),
            FieldKey::LongRunDay => json!(self.long_run_day),
            FieldKey::RecentRuns => json!(self.recent_runs),
            FieldKey::ExperienceLevel => json!(self.experience_level),
            FieldKey::Injuries => json!(self.injuries),
            FieldKey::InjuryOther => json!(self.injury_other),
        }
    }
}
