use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

use super::answers::{Answers, Goal, GoalAnswer, Injury, RaceDistance, RaceGoal, Weekday};
use super::fields::{FieldKey, FieldValue};
use super::steps::StepId;
use crate::store::{LocalStore, keys};

/// Everything the draft needs to resume the flow: answers plus current step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    #[serde(default)]
    pub step: StepId,
    #[serde(default)]
    pub answers: Answers,
}

/// Outcome of a single [`FormStateMachine::set_field`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityResult {
    pub field: FieldKey,
    /// False when the value did not fit the key or its branch is inactive.
    pub applied: bool,
    /// Dependent fields cleared by this update.
    pub cleared: Vec<FieldKey>,
    pub step: StepId,
    pub step_valid: bool,
}

/// Holds the questionnaire answers and the active step.
///
/// Invalid input never errors: it either leaves the answers untouched
/// (`applied == false`) or shows up as a step that is not valid.
#[derive(Debug, Clone, Default)]
pub struct FormStateMachine {
    state: FormState,
}

impl FormStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: FormState) -> Self {
        let mut machine = Self { state };
        machine.ensure_current_reachable();
        machine
    }

    /// Rebuild from the persisted draft. A missing or unreadable draft starts
    /// a fresh questionnaire.
    pub fn restore(store: &dyn LocalStore) -> Self {
        let raw = match store.get(keys::DRAFT) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::new(),
            Err(e) => {
                warn!(error = %e, "could not read draft; starting fresh");
                return Self::new();
            }
        };
        match serde_json::from_str::<FormState>(&raw) {
            Ok(state) => {
                debug!(step = %state.step, "restored questionnaire draft");
                Self::from_state(state)
            }
            Err(e) => {
                warn!(error = %e, "discarding unreadable draft");
                Self::new()
            }
        }
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn answers(&self) -> &Answers {
        &self.state.answers
    }

    pub fn current_step(&self) -> StepId {
        self.state.step
    }

    pub fn set_field(&mut self, key: FieldKey, value: FieldValue) -> ValidityResult {
        let mut cleared = Vec::new();
        let applied = match self.apply(key, value, &mut cleared) {
            Ok(()) => true,
            Err(reason) => {
                debug!(field = %key, reason, "field update ignored");
                false
            }
        };
        if key.is_branch() && !cleared.is_empty() {
            debug!(field = %key, ?cleared, "cleared dependent fields");
        }
        self.ensure_current_reachable();

        let step = key.step();
        ValidityResult {
            field: key,
            applied,
            cleared,
            step,
            step_valid: self.is_step_valid(step),
        }
    }

    pub fn is_step_valid(&self, step: StepId) -> bool {
        step.is_reachable(&self.state.answers) && step.is_valid(&self.state.answers)
    }

    pub fn reachable_steps(&self) -> Vec<StepId> {
        StepId::ALL
            .into_iter()
            .filter(|s| s.is_reachable(&self.state.answers))
            .collect()
    }

    /// Every reachable step is valid.
    pub fn is_complete(&self) -> bool {
        self.reachable_steps()
            .into_iter()
            .all(|s| s.is_valid(&self.state.answers))
    }

    /// Step shown by "back" from `step`, given the current branch values.
    pub fn previous_route_for(&self, step: StepId) -> Option<StepId> {
        StepId::ALL[..step.index()]
            .iter()
            .rev()
            .copied()
            .find(|s| s.is_reachable(&self.state.answers))
    }

    pub fn next_route_for(&self, step: StepId) -> Option<StepId> {
        StepId::ALL[step.index() + 1..]
            .iter()
            .copied()
            .find(|s| s.is_reachable(&self.state.answers))
    }

    pub fn next(&mut self) -> Option<StepId> {
        let next = self.next_route_for(self.state.step)?;
        self.state.step = next;
        Some(next)
    }

    pub fn prev(&mut self) -> Option<StepId> {
        let prev = self.previous_route_for(self.state.step)?;
        self.state.step = prev;
        Some(prev)
    }

    /// Jump to `step` if it is on the current path.
    pub fn go_to_step(&mut self, step: StepId) -> bool {
        if !step.is_reachable(&self.state.answers) {
            return false;
        }
        self.state.step = step;
        true
    }

    fn ensure_current_reachable(&mut self) {
        let current = self.state.step;
        if !current.is_reachable(&self.state.answers) {
            self.state.step = self.previous_route_for(current).unwrap_or_default();
        }
    }

    fn apply(
        &mut self,
        key: FieldKey,
        value: FieldValue,
        cleared: &mut Vec<FieldKey>,
    ) -> Result<(), &'static str> {
        let answers = &mut self.state.answers;
        match key {
            FieldKey::Name => answers.name = optional_text(value)?,
            FieldKey::Email => answers.email = optional_text(value)?,
            FieldKey::Goal => match value {
                FieldValue::Clear => {
                    if let Some(previous) = answers.goal.take() {
                        cleared.extend(dependent_keys(&previous));
                    }
                }
                other => {
                    let goal: Goal = parse_choice(other)?;
                    set_goal(answers, goal, cleared);
                }
            },
            FieldKey::GoalOther => match answers.goal.as_mut() {
                Some(GoalAnswer::Other { detail }) => *detail = optional_text(value)?,
                _ => return Err("goal is not 'other'"),
            },
            FieldKey::RaceDistance => {
                let details = answers.race_details_mut().ok_or("no race goal selected")?;
                let distance = match value {
                    FieldValue::Clear => None,
                    other => Some(parse_choice::<RaceDistance>(other)?),
                };
                if distance != Some(RaceDistance::Other) && details.distance_other.take().is_some()
                {
                    cleared.push(FieldKey::RaceDistanceOther);
                }
                details.distance = distance;
            }
            FieldKey::RaceDistanceOther => {
                let details = answers.race_details_mut().ok_or("no race goal selected")?;
                if details.distance != Some(RaceDistance::Other) {
                    return Err("race distance is not 'other'");
                }
                details.distance_other = optional_text(value)?;
            }
            FieldKey::TargetRaceDate => {
                let details = answers.race_details_mut().ok_or("no race goal selected")?;
                details.target_date = match value {
                    FieldValue::Clear => None,
                    FieldValue::Date(date) => Some(date),
                    FieldValue::Text(raw) => Some(
                        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                            .map_err(|_| "expected YYYY-MM-DD")?,
                    ),
                    _ => return Err("expected a date"),
                };
            }
            FieldKey::TargetFinishTime => {
                if !matches!(
                    answers.goal,
                    Some(GoalAnswer::Race {
                        goal: RaceGoal::ImproveRaceTime,
                        ..
                    })
                ) {
                    return Err("finish time only applies to improve_race_time");
                }
                let details = answers.race_details_mut().ok_or("no race goal selected")?;
                details.target_finish_time = match value {
                    FieldValue::Clear => None,
                    FieldValue::Seconds(secs) => Some(secs),
                    _ => return Err("expected seconds"),
                };
            }
            FieldKey::TrainingDays => {
                let days: Vec<Weekday> = parse_choice_list(value)?;
                if let Some(long_run) = answers.long_run_day
                    && !days.contains(&long_run)
                {
                    answers.long_run_day = None;
                    cleared.push(FieldKey::LongRunDay);
                }
                answers.training_days = days;
            }
            FieldKey::LongRunDay => {
                answers.long_run_day = match value {
                    FieldValue::Clear => None,
                    other => Some(parse_choice(other)?),
                };
            }
            FieldKey::RecentRuns => {
                answers.recent_runs = match value {
                    FieldValue::Clear => Vec::new(),
                    FieldValue::Runs(runs) => runs,
                    _ => return Err("expected run records"),
                };
            }
            FieldKey::ExperienceLevel => {
                answers.experience_level = match value {
                    FieldValue::Clear => None,
                    other => Some(parse_choice(other)?),
                };
            }
            FieldKey::Injuries => {
                let injuries: Vec<Injury> = parse_choice_list(value)?;
                if !injuries.contains(&Injury::Other) && answers.injury_other.take().is_some() {
                    cleared.push(FieldKey::InjuryOther);
                }
                answers.injuries = injuries;
            }
            FieldKey::InjuryOther => {
                if !answers.injuries.contains(&Injury::Other) {
                    return Err("injuries do not include 'other'");
                }
                answers.injury_other = optional_text(value)?;
            }
        }
        Ok(())
    }
}

/// Switch the branch field, dropping whatever the new goal no longer needs.
fn set_goal(answers: &mut Answers, goal: Goal, cleared: &mut Vec<FieldKey>) {
    let next = match (answers.goal.take(), goal.race_goal()) {
        (Some(GoalAnswer::Race { mut details, .. }), Some(race_goal)) => {
            if race_goal != RaceGoal::ImproveRaceTime && details.target_finish_time.take().is_some()
            {
                cleared.push(FieldKey::TargetFinishTime);
            }
            GoalAnswer::Race {
                goal: race_goal,
                details,
            }
        }
        (Some(GoalAnswer::Other { detail }), None) if goal == Goal::Other => {
            GoalAnswer::Other { detail }
        }
        (previous, _) => {
            if let Some(previous) = previous {
                cleared.extend(dependent_keys(&previous));
            }
            GoalAnswer::fresh(goal)
        }
    };
    answers.goal = Some(next);
}

/// Keys that hold a value only because of this goal.
fn dependent_keys(goal: &GoalAnswer) -> Vec<FieldKey> {
    match goal {
        GoalAnswer::Race { details, .. } => [
            (FieldKey::RaceDistance, details.distance.is_some()),
            (FieldKey::RaceDistanceOther, details.distance_other.is_some()),
            (FieldKey::TargetRaceDate, details.target_date.is_some()),
            (FieldKey::TargetFinishTime, details.target_finish_time.is_some()),
        ]
        .into_iter()
        .filter_map(|(key, set)| set.then_some(key))
        .collect(),
        GoalAnswer::Other { detail: Some(_) } => vec![FieldKey::GoalOther],
        _ => Vec::new(),
    }
}

fn optional_text(value: FieldValue) -> Result<Option<String>, &'static str> {
    match value {
        FieldValue::Clear => Ok(None),
        FieldValue::Text(text) => {
            let trimmed = text.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        _ => Err("expected text"),
    }
}

fn parse_choice<T: FromStr>(value: FieldValue) -> Result<T, &'static str> {
    match value {
        FieldValue::Text(raw) => raw.trim().parse().map_err(|_| "unknown choice"),
        _ => Err("expected a choice"),
    }
}

fn parse_choice_list<T: FromStr + PartialEq>(value: FieldValue) -> Result<Vec<T>, &'static str> {
    let raw = match value {
        FieldValue::Clear => return Ok(Vec::new()),
        FieldValue::List(items) => items,
        FieldValue::Text(single) => vec![single],
        _ => return Err("expected a list of choices"),
    };
    let mut parsed: Vec<T> = Vec::with_capacity(raw.len());
    for item in raw {
        let choice: T = item.trim().parse().map_err(|_| "unknown choice")?;
        if !parsed.contains(&choice) {
            parsed.push(choice);
        }
    }
    Ok(parsed)
}
