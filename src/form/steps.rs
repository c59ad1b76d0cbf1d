use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::answers::{Answers, GoalAnswer, Injury, RaceDistance, RaceGoal};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepId {
    #[default]
    AboutYou,
    Goal,
    RaceDetails,
    TrainingDays,
    RecentRuns,
    Experience,
    Review,
}

impl StepId {
    /// Declaration order. Reachability filters this per answer set.
    pub const ALL: [Self; 7] = [
        Self::AboutYou,
        Self::Goal,
        Self::RaceDetails,
        Self::TrainingDays,
        Self::RecentRuns,
        Self::Experience,
        Self::Review,
    ];

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Whether the step is on the path for the current branch values.
    pub fn is_reachable(self, answers: &Answers) -> bool {
        match self {
            Self::RaceDetails => answers.race().is_some(),
            _ => true,
        }
    }

    /// Pure validity check against the step's required fields, including
    /// sibling-conditional requirements.
    pub fn is_valid(self, answers: &Answers) -> bool {
        match self {
            Self::AboutYou => {
                has_text(answers.name.as_deref()) && is_email(answers.email.as_deref())
            }
            Self::Goal => match &answers.goal {
                None => false,
                Some(GoalAnswer::Other { detail }) => has_text(detail.as_deref()),
                Some(_) => true,
            },
            Self::RaceDetails => {
                let Some((goal, details)) = answers.race() else {
                    return false;
                };
                let distance_ok = match details.distance {
                    None => false,
                    Some(RaceDistance::Other) => has_text(details.distance_other.as_deref()),
                    Some(_) => true,
                };
                let time_ok = goal != RaceGoal::ImproveRaceTime
                    || details.target_finish_time.is_some_and(|t| t > 0);
                distance_ok && details.target_date.is_some() && time_ok
            }
            Self::TrainingDays => {
                !answers.training_days.is_empty()
                    && answers
                        .long_run_day
                        .is_none_or(|day| answers.training_days.contains(&day))
            }
            Self::RecentRuns => answers.recent_runs.iter().all(|run| run.is_valid()),
            Self::Experience => {
                answers.experience_level.is_some()
                    && (!answers.injuries.contains(&Injury::Other)
                        || has_text(answers.injury_other.as_deref()))
            }
            Self::Review => true,
        }
    }
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn is_email(value: Option<&str>) -> bool {
    let Some(value) = value.map(str::trim) else {
        return false;
    };
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}
