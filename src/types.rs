use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Records that carry a stable numeric identifier.
///
/// Required for list-mode polling, where a record is delivered only the first
/// time its id shows up.
pub trait Identified {
    fn id(&self) -> i64;
}

/// Result of judging one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judging {
    pub id: i64,
    pub submission: i64,
    /// Verdict such as `correct` or `wrong-answer`; absent while still judging.
    #[serde(default)]
    pub outcome: Option<String>,
    /// Unix time the judging started.
    #[serde(default)]
    pub time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub team: i64,
    pub problem: i64,
    #[serde(default)]
    pub language: String,
    /// Unix time of submission.
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: i64,
    #[serde(default)]
    pub shortname: String,
    #[serde(default)]
    pub name: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub freeze: Option<f64>,
    #[serde(default)]
    pub unfreeze: Option<f64>,
    /// Penalty minutes per rejected submission.
    #[serde(default)]
    pub penalty: i64,
}

/// Judge-wide settings. Only the scoring-relevant keys are typed; everything
/// else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default)]
    pub penalty_time: Option<i64>,
    #[serde(default)]
    pub compile_penalty: Option<bool>,
    #[serde(default)]
    pub score_in_seconds: Option<bool>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    #[serde(alias = "teamid")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: Option<i64>,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(alias = "probid")]
    pub id: i64,
    #[serde(default)]
    pub shortname: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(alias = "categoryid")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sortorder: i64,
}

macro_rules! impl_identified {
    ($($ty:ty),* $(,)?) => {
        $(impl Identified for $ty {
            fn id(&self) -> i64 {
                self.id
            }
        })*
    };
}

impl_identified!(Judging, Submission, Contest, Team, Problem, Category);
