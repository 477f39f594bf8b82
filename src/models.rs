use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

/// Attempt status as reported by the source system.
///
/// Input is matched case-insensitively. Values outside the three known
/// states are kept verbatim (lowercased) in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Completed,
    Failed,
    InProgress,
    Other(String),
}

impl Status {
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "completed" => Status::Completed,
            "failed" => Status::Failed,
            "inprogress" => Status::InProgress,
            _ => Status::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::InProgress => "inprogress",
            Status::Other(value) => value.as_str(),
        }
    }

    /// Rank used to break completion-date ties during deduplication.
    pub fn priority(&self) -> u8 {
        match self {
            Status::Completed => 3,
            Status::Failed => 2,
            Status::InProgress => 1,
            Status::Other(_) => 0,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One validated course attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub course_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: Status,
    pub grade: Option<i32>,
    pub completion_date: Option<NaiveDate>,
}

impl CourseRecord {
    pub fn identity(&self) -> IdentityKey {
        IdentityKey {
            email: self.email.clone(),
            course_name: self.course_name.clone(),
        }
    }

    /// Grade of a completed attempt, if one was recorded.
    pub fn completed_grade(&self) -> Option<i32> {
        match self.status {
            Status::Completed => self.grade,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub email: String,
    pub course_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultCounts {
    pub completed: usize,
    pub failed: usize,
    pub inprogress: usize,
}

impl ResultCounts {
    /// Bumps the bucket for `status`. Unrecognized statuses have no bucket.
    pub fn record(&mut self, status: &Status) {
        match status {
            Status::Completed => self.completed += 1,
            Status::Failed => self.failed += 1,
            Status::InProgress => self.inprogress += 1,
            Status::Other(_) => {}
        }
    }
}

/// Entry of `courses.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSummary {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub results: ResultCounts,
    pub grades: BTreeMap<i32, usize>,
    pub first_completion_date: Option<NaiveDate>,
    pub most_recent_completion_date: Option<NaiveDate>,
}

/// Entry of `users.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub course_results: ResultCounts,
    pub grade_average: Option<f64>,
}

/// Entry of `course_results.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub course_name: String,
    pub email: String,
    pub status: Status,
    pub grade: Option<i32>,
    pub date: Option<NaiveDate>,
}

/// The three views produced for one input file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summaries {
    pub courses: Vec<CourseSummary>,
    pub users: Vec<UserSummary>,
    pub results: Vec<ResultEntry>,
}
