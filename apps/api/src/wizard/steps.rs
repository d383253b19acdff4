use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDescriptor {
    pub id: u8,
    pub name: &'static str,
    pub estimated_time_minutes: u8,
    pub icon: &'static str,
}

pub const GOALS_STEP: u8 = 1;
pub const SKILLS_STEP: u8 = 2;
pub const PERSONALITY_STEP: u8 = 3;
pub const PREFERENCES_STEP: u8 = 4;
pub const RESULTS_STEP: u8 = 5;

pub const STEPS: [StepDescriptor; 5] = [
    StepDescriptor {
        id: GOALS_STEP,
        name: "Career Goals",
        estimated_time_minutes: 2,
        icon: "target",
    },
    StepDescriptor {
        id: SKILLS_STEP,
        name: "Skills Assessment",
        estimated_time_minutes: 5,
        icon: "wrench",
    },
    StepDescriptor {
        id: PERSONALITY_STEP,
        name: "Personality Profile",
        estimated_time_minutes: 8,
        icon: "brain",
    },
    StepDescriptor {
        id: PREFERENCES_STEP,
        name: "Learning Preferences",
        estimated_time_minutes: 3,
        icon: "book",
    },
    StepDescriptor {
        id: RESULTS_STEP,
        name: "Results",
        estimated_time_minutes: 2,
        icon: "chart",
    },
];

pub const STEP_COUNT: u8 = STEPS.len() as u8;

/// Forces any stored step number into `[1, STEP_COUNT]`.
pub fn clamp_step(step: i64) -> u8 {
    step.clamp(1, STEP_COUNT as i64) as u8
}

pub fn total_estimated_minutes() -> u32 {
    STEPS.iter().map(|s| s.estimated_time_minutes as u32).sum()
}
