//! Personality question catalog used by step 3.
//!
//! Each item is a Likert statement (1 = strongly disagree, 5 = strongly agree)
//! tagged with the dimension it probes.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Openness,
    Conscientiousness,
    Extraversion,
    Agreeableness,
    Neuroticism,
    Realistic,
    Investigative,
    Artistic,
    Social,
    Enterprising,
    Conventional,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Question {
    pub id: &'static str,
    pub text: &'static str,
    pub dimension: Dimension,
}

pub const LIKERT_MIN: u8 = 1;
pub const LIKERT_MAX: u8 = 5;

const fn q(id: &'static str, text: &'static str, dimension: Dimension) -> Question {
    Question {
        id,
        text,
        dimension,
    }
}

use Dimension::*;

pub const QUESTIONS: [Question; 32] = [
    q("q1", "I enjoy exploring ideas that have no obvious practical use.", Openness),
    q("q2", "I like trying unfamiliar tools and ways of working.", Openness),
    q("q3", "Abstract problems hold my attention for a long time.", Openness),
    q("q4", "I finish tasks well before their deadline.", Conscientiousness),
    q("q5", "I keep detailed notes and plans for my work.", Conscientiousness),
    q("q6", "I double-check my work before handing it over.", Conscientiousness),
    q("q7", "I get energy from working with groups of people.", Extraversion),
    q("q8", "I am comfortable presenting to an audience.", Extraversion),
    q("q9", "I start conversations with people I do not know.", Extraversion),
    q("q10", "I go out of my way to help colleagues succeed.", Agreeableness),
    q("q11", "I prefer finding compromise over winning an argument.", Agreeableness),
    q("q12", "I trust people's intentions until proven otherwise.", Agreeableness),
    q("q13", "Unexpected changes to a plan make me anxious.", Neuroticism),
    q("q14", "I worry about mistakes long after they happen.", Neuroticism),
    q("q15", "Tight deadlines stress me out.", Neuroticism),
    q("q16", "I like building or repairing physical things.", Realistic),
    q("q17", "I prefer hands-on work over desk work.", Realistic),
    q("q18", "I would enjoy operating machinery or technical equipment.", Realistic),
    q("q19", "I like analysing data to find out why something happens.", Investigative),
    q("q20", "I enjoy reading research papers or technical documentation.", Investigative),
    q("q21", "Solving puzzles is one of my favourite pastimes.", Investigative),
    q("q22", "I express myself through writing, design, music or art.", Artistic),
    q("q23", "I like work with room for original ideas.", Artistic),
    q("q24", "Aesthetics matter to me in everything I make.", Artistic),
    q("q25", "I enjoy teaching or mentoring others.", Social),
    q("q26", "I would like a job where I help people directly.", Social),
    q("q27", "Listening to other people's problems comes naturally to me.", Social),
    q("q28", "I like persuading others to support my ideas.", Enterprising),
    q("q29", "I would enjoy starting and running my own business.", Enterprising),
    q("q30", "I seek out leadership roles in teams.", Enterprising),
    q("q31", "I like following clear procedures and standards.", Conventional),
    q("q32", "Organising records and data is satisfying to me.", Conventional),
];

pub fn question_ids() -> impl Iterator<Item = &'static str> {
    QUESTIONS.iter().map(|q| q.id)
}

pub fn is_valid_answer(answer: u8) -> bool {
    (LIKERT_MIN..=LIKERT_MAX).contains(&answer)
}
