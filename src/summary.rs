use std::collections::BTreeMap;

use tracing::info;

use crate::models::{
    CourseRecord, CourseSummary, ResultCounts, ResultEntry, Status, Summaries, UserSummary,
};

/// One entry per course name, sorted by name.
///
/// The course window comes from the first record seen for that name. Grade
/// histogram and first/last completion dates only look at completed attempts
/// that carry a grade.
pub fn summarize_courses(records: &[CourseRecord]) -> Vec<CourseSummary> {
    let mut map: BTreeMap<&str, CourseSummary> = BTreeMap::new();

    for record in records {
        let entry = map
            .entry(record.course_name.as_str())
            .or_insert_with(|| CourseSummary {
                name: record.course_name.clone(),
                start_date: record.start_date,
                end_date: record.end_date,
                results: ResultCounts::default(),
                grades: BTreeMap::new(),
                first_completion_date: None,
                most_recent_completion_date: None,
            });

        entry.results.record(&record.status);

        let Some(grade) = record.completed_grade() else {
            continue;
        };
        *entry.grades.entry(grade).or_insert(0) += 1;

        if let Some(completed_on) = record.completion_date {
            entry.first_completion_date = Some(match entry.first_completion_date {
                Some(first) => first.min(completed_on),
                None => completed_on,
            });
            entry.most_recent_completion_date = Some(match entry.most_recent_completion_date {
                Some(last) => last.max(completed_on),
                None => completed_on,
            });
        }
    }

    let summaries: Vec<CourseSummary> = map.into_values().collect();
    info!("Summarized {} courses", summaries.len());
    summaries
}

/// One entry per email, sorted by email. Names come from the first record
/// seen for that user.
pub fn summarize_users(records: &[CourseRecord]) -> Vec<UserSummary> {
    let mut map: BTreeMap<&str, (UserSummary, i64, usize)> = BTreeMap::new();

    for record in records {
        let (entry, grade_total, graded) = map.entry(record.email.as_str()).or_insert_with(|| {
            (
                UserSummary {
                    first_name: record.first_name.clone(),
                    last_name: record.last_name.clone(),
                    email: record.email.clone(),
                    course_results: ResultCounts::default(),
                    grade_average: None,
                },
                0,
                0,
            )
        });

        entry.course_results.record(&record.status);
        if let Some(grade) = record.completed_grade() {
            *grade_total += i64::from(grade);
            *graded += 1;
        }
    }

    let summaries: Vec<UserSummary> = map
        .into_values()
        .map(|(mut summary, grade_total, graded)| {
            summary.grade_average = if graded == 0 {
                None
            } else {
                Some(grade_total as f64 / graded as f64)
            };
            summary
        })
        .collect();

    info!("Summarized {} users", summaries.len());
    summaries
}

/// Flat list of finished attempts (completed or failed) in input order.
pub fn summarize_results(records: &[CourseRecord]) -> Vec<ResultEntry> {
    let results: Vec<ResultEntry> = records
        .iter()
        .filter(|record| matches!(record.status, Status::Completed | Status::Failed))
        .map(|record| ResultEntry {
            course_name: record.course_name.clone(),
            email: record.email.clone(),
            status: record.status.clone(),
            grade: record.grade,
            date: record.completion_date,
        })
        .collect();

    info!("Generated {} course result entries", results.len());
    results
}

/// Builds all three views. The summarizers only read `records`, so they
/// run side by side on the rayon pool.
pub fn summarize(records: &[CourseRecord]) -> Summaries {
    let (courses, (users, results)) = rayon::join(
        || summarize_courses(records),
        || rayon::join(|| summarize_users(records), || summarize_results(records)),
    );

    Summaries {
        courses,
        users,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(
        email: &str,
        course: &str,
        status: Status,
        grade: Option<i32>,
        completion: Option<NaiveDate>,
    ) -> CourseRecord {
        CourseRecord {
            first_name: "Avery".to_string(),
            last_name: "Lee".to_string(),
            email: email.to_string(),
            course_name: course.to_string(),
            start_date: date(2022, 1, 1),
            end_date: date(2022, 12, 31),
            status,
            grade,
            completion_date: completion,
        }
    }

    fn sample() -> Vec<CourseRecord> {
        vec![
            record("avery@x.com", "CS101", Status::Completed, Some(5), Some(date(2022, 3, 1))),
            record("jules@x.com", "CS101", Status::Completed, Some(3), Some(date(2022, 5, 1))),
            record("kiara@x.com", "CS101", Status::Completed, None, Some(date(2022, 1, 2))),
            record("mo@x.com", "CS101", Status::Failed, None, Some(date(2022, 11, 1))),
            record("avery@x.com", "BIO1", Status::InProgress, None, None),
            record("jules@x.com", "BIO1", Status::Completed, Some(4), Some(date(2022, 2, 1))),
        ]
    }

    #[test]
    fn course_summary_counts_and_grades() {
        let courses = summarize_courses(&sample());
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].name, "BIO1");

        let cs = &courses[1];
        assert_eq!(cs.name, "CS101");
        assert_eq!(
            cs.results,
            ResultCounts {
                completed: 3,
                failed: 1,
                inprogress: 0
            }
        );
        assert_eq!(cs.grades, BTreeMap::from([(3, 1), (5, 1)]));
        // ungraded completion on 2022-01-02 and the failed attempt do not count
        assert_eq!(cs.first_completion_date, Some(date(2022, 3, 1)));
        assert_eq!(cs.most_recent_completion_date, Some(date(2022, 5, 1)));
    }

    #[test]
    fn course_without_graded_completions_has_no_dates() {
        let records = vec![record("a@x.com", "ART", Status::InProgress, None, None)];
        let courses = summarize_courses(&records);
        assert!(courses[0].grades.is_empty());
        assert_eq!(courses[0].first_completion_date, None);
        assert_eq!(courses[0].most_recent_completion_date, None);
        assert_eq!(courses[0].results.inprogress, 1);
    }

    #[test]
    fn user_average_over_graded_completions() {
        let users = summarize_users(&sample());
        let jules = users.iter().find(|u| u.email == "jules@x.com").unwrap();
        assert_eq!(jules.grade_average, Some(3.5));
        assert_eq!(jules.course_results.completed, 2);

        let mo = users.iter().find(|u| u.email == "mo@x.com").unwrap();
        assert_eq!(mo.grade_average, None);
        assert_eq!(mo.course_results.failed, 1);

        let kiara = users.iter().find(|u| u.email == "kiara@x.com").unwrap();
        assert_eq!(kiara.grade_average, None);
    }

    #[test]
    fn results_exclude_inprogress() {
        let results = summarize_results(&sample());
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.status != Status::InProgress));
        assert_eq!(results[3].status, Status::Failed);
        assert_eq!(results[3].grade, None);
    }

    #[test]
    fn unknown_status_only_appears_in_no_bucket() {
        let records = vec![record("a@x.com", "ART", Status::Other("paused".into()), None, Some(date(2022, 2, 2)))];
        let summaries = summarize(&records);
        assert_eq!(summaries.courses[0].results, ResultCounts::default());
        assert_eq!(summaries.users[0].course_results, ResultCounts::default());
        assert!(summaries.results.is_empty());
    }

    #[test]
    fn parallel_matches_sequential() {
        let records = sample();
        let summaries = summarize(&records);
        assert_eq!(summaries.courses, summarize_courses(&records));
        assert_eq!(summaries.users, summarize_users(&records));
        assert_eq!(summaries.results, summarize_results(&records));
    }

    #[test]
    fn serialized_field_names() {
        let summaries = summarize(&sample());
        let course = serde_json::to_value(&summaries.courses[1]).unwrap();
        assert_eq!(course["results"]["completed"], 3);
        assert_eq!(course["grades"]["5"], 1);
        assert_eq!(course["first_completion_date"], "2022-03-01");

        let mo = summaries.users.iter().find(|u| u.email == "mo@x.com").unwrap();
        let user = serde_json::to_value(mo).unwrap();
        assert!(user["grade_average"].is_null());
        assert!(user.get("course_results").is_some());

        let result = serde_json::to_value(&summaries.results[0]).unwrap();
        assert_eq!(result["course_name"], "CS101");
        assert_eq!(result["status"], "completed");
        assert_eq!(result["date"], "2022-03-01");
    }
}
