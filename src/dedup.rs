use std::collections::HashMap;

use tracing::{debug, info};

use crate::models::{CourseRecord, IdentityKey};

/// Whether `candidate` should replace `existing` for the same identity key.
///
/// A later completion date wins, and any date beats none. Equal dates
/// (both absent included) fall back to status priority. Full ties keep
/// the existing record.
pub fn supersedes(candidate: &CourseRecord, existing: &CourseRecord) -> bool {
    match (candidate.completion_date, existing.completion_date) {
        (Some(new), Some(old)) if new != old => new > old,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        _ => candidate.status.priority() > existing.status.priority(),
    }
}

/// Collapses attempts to one record per `(email, course_name)`.
///
/// Output keeps the order in which each key was first seen.
pub fn deduplicate(records: Vec<CourseRecord>) -> Vec<CourseRecord> {
    let total = records.len();
    let mut slots: HashMap<IdentityKey, usize> = HashMap::new();
    let mut canonical: Vec<CourseRecord> = Vec::new();

    for record in records {
        let key = record.identity();
        match slots.get(&key).copied() {
            None => {
                debug!(email = %key.email, course = %key.course_name, "Adding new entry");
                slots.insert(key, canonical.len());
                canonical.push(record);
            }
            Some(slot) => {
                let existing = &mut canonical[slot];
                if supersedes(&record, existing) {
                    debug!(
                        email = %key.email,
                        course = %key.course_name,
                        old_status = %existing.status,
                        new_status = %record.status,
                        "Replacing entry"
                    );
                    *existing = record;
                }
            }
        }
    }

    info!(
        "Removed {} duplicates down to {} records",
        total - canonical.len(),
        canonical.len()
    );
    canonical
}
