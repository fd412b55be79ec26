//! Response types for the analysis backend.
//!
//! Only the shapes this client reads are modelled; scoring itself happens on
//! the server.

use serde::{Deserialize, Serialize};

/// One stored resume analysis, as listed on the recruiter dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeSummary {
    pub id: i64,
    pub student_email: String,
    pub ats_score: f64,
    #[serde(default)]
    pub upload_time: Option<String>,
    #[serde(default)]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub keyword_overlap: Option<f64>,
    #[serde(default)]
    pub matched_skills: Option<String>,
    #[serde(default)]
    pub missing_skills: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
}

impl ResumeSummary {
    /// Skills are stored server-side as a comma-separated string.
    pub fn matched_skill_list(&self) -> Vec<&str> {
        split_skills(self.matched_skills.as_deref())
    }

    pub fn missing_skill_list(&self) -> Vec<&str> {
        split_skills(self.missing_skills.as_deref())
    }
}

fn split_skills(raw: Option<&str>) -> Vec<&str> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|skill| !skill.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
