//! Onboarding questionnaire: typed answers, the branching step graph, and the
//! state machine the UI drives.

pub mod answers;
pub mod fields;
pub mod machine;
pub mod steps;

pub use answers::{
    Answers, ExperienceLevel, FieldMap, Goal, GoalAnswer, Injury, RaceDetails, RaceDistance,
    RaceGoal, RecentRun, Weekday,
};
pub use fields::{FieldKey, FieldValue};
pub use machine::{FormState, FormStateMachine, ValidityResult};
pub use steps::StepId;
