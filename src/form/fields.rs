use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use strum::{AsRefStr, Display, EnumString};

use super::answers::RecentRun;
use super::steps::StepId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum FieldKey {
    Name,
    Email,
    Goal,
    GoalOther,
    RaceDistance,
    RaceDistanceOther,
    TargetRaceDate,
    TargetFinishTime,
    TrainingDays,
    LongRunDay,
    RecentRuns,
    ExperienceLevel,
    Injuries,
    InjuryOther,
}

impl FieldKey {
    pub const ALL: [Self; 14] = [
        Self::Name,
        Self::Email,
        Self::Goal,
        Self::GoalOther,
        Self::RaceDistance,
        Self::RaceDistanceOther,
        Self::TargetRaceDate,
        Self::TargetFinishTime,
        Self::TrainingDays,
        Self::LongRunDay,
        Self::RecentRuns,
        Self::ExperienceLevel,
        Self::Injuries,
        Self::InjuryOther,
    ];

    /// The step that renders this field.
    pub fn step(self) -> StepId {
        match self {
            Self::Name | Self::Email => StepId::AboutYou,
            Self::Goal | Self::GoalOther => StepId::Goal,
            Self::RaceDistance
            | Self::RaceDistanceOther
            | Self::TargetRaceDate
            | Self::TargetFinishTime => StepId::RaceDetails,
            Self::TrainingDays | Self::LongRunDay => StepId::TrainingDays,
            Self::RecentRuns => StepId::RecentRuns,
            Self::ExperienceLevel | Self::Injuries | Self::InjuryOther => StepId::Experience,
        }
    }

    /// Keys whose value changes can clear other keys.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Self::Goal | Self::RaceDistance | Self::TrainingDays | Self::Injuries
        )
    }
}

/// A value handed to [`FormStateMachine::set_field`](super::FormStateMachine::set_field).
///
/// Enumerated choices travel as `Text` and are parsed against the key.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Seconds(u32),
    List(Vec<String>),
    Runs(Vec<RecentRun>),
    Clear,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Parse command-line input for `key`. Lists are comma separated, times
    /// accept `h:mm:ss`, `mm:ss` or plain seconds, runs are `km@minutes`.
    pub fn parse_for(key: FieldKey, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "-" {
            return Ok(Self::Clear);
        }
        match key {
            FieldKey::TargetRaceDate => {
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))?;
                Ok(Self::Date(date))
            }
            FieldKey::TargetFinishTime => parse_duration_secs(raw).map(Self::Seconds),
            FieldKey::TrainingDays | FieldKey::Injuries => Ok(Self::List(split_list(raw))),
            FieldKey::RecentRuns => split_list(raw)
                .iter()
                .map(|entry| parse_run(entry))
                .collect::<Result<Vec<_>>>()
                .map(Self::Runs),
            _ => Ok(Self::Text(raw.to_string())),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_duration_secs(raw: &str) -> Result<u32> {
    let mut total: u32 = 0;
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() > 3 {
        bail!("invalid duration '{raw}'");
    }
    for part in parts {
        let value: u32 = part
            .parse()
            .with_context(|| format!("invalid duration '{raw}'"))?;
        total = total
            .checked_mul(60)
            .and_then(|t| t.checked_add(value))
            .with_context(|| format!("duration '{raw}' out of range"))?;
    }
    Ok(total)
}

fn parse_run(entry: &str) -> Result<RecentRun> {
    let (km, minutes) = entry
        .split_once('@')
        .with_context(|| format!("invalid run '{entry}', expected km@minutes"))?;
    Ok(RecentRun {
        distance_km: km
            .trim()
            .parse()
            .with_context(|| format!("invalid distance in '{entry}'"))?,
        duration_minutes: minutes
            .trim()
            .parse()
            .with_context(|| format!("invalid minutes in '{entry}'"))?,
    })
}
