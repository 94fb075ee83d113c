//! Deadline status engine.
//!
//! [`evaluate`] classifies a single enrollment against its course schedule;
//! [`StatusService`] applies it across everything a user is enrolled in.
//!
//! The deadline clock starts at the enrollment date. A course is overdue only
//! once the elapsed whole days strictly exceed the allotted days, so the
//! deadline day itself is still on track. Completion always wins, however late.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::warn;

use crate::models::{
    ClassifiedStatus, EnrollmentRecord, EnrollmentStatus, ScheduleRecord, ScheduleStatus,
    UserSummary,
};

/// Classify one enrollment against the schedule for the same course.
pub fn evaluate(
    enrollment: &EnrollmentRecord,
    schedule: &ScheduleRecord,
    as_of: NaiveDateTime,
) -> ClassifiedStatus {
    let allotted = i64::from(schedule.days_to_complete);
    let days_elapsed = enrollment.days_since_enrollment(as_of);
    let days_overdue = (days_elapsed - allotted).max(0);
    let days_remaining = allotted - days_elapsed;

    let (status, days_overdue, message) = if enrollment.is_completed() {
        let message = match enrollment.completion_date {
            Some(done) => format!("Completed on {}", done.format("%Y-%m-%d")),
            None => "Completed".to_string(),
        };
        (ScheduleStatus::Completed, 0, message)
    } else if days_elapsed > allotted {
        let detail = if enrollment.is_started() {
            "In progress but overdue"
        } else {
            "Not started"
        };
        (
            ScheduleStatus::NeedsReminder,
            days_overdue,
            format!("{detail} - {days_overdue} days overdue"),
        )
    } else if enrollment.status == EnrollmentStatus::InProgress {
        (
            ScheduleStatus::Progressed,
            0,
            format!("In progress - {days_remaining} days remaining"),
        )
    } else if enrollment.is_started() {
        (
            ScheduleStatus::Started,
            0,
            format!("Started - {days_remaining} days remaining"),
        )
    } else {
        (
            ScheduleStatus::Started,
            0,
            format!("Enrolled - {days_remaining} days to start and complete"),
        )
    };

    ClassifiedStatus {
        course_id: enrollment.course_id.clone(),
        status,
        enrollment: Some(enrollment.clone()),
        schedule: schedule.clone(),
        days_overdue,
        message,
    }
}

/// Course-id keyed schedule book plus the per-user derivations built on it.
#[derive(Debug, Clone, Default)]
pub struct StatusService {
    schedules: IndexMap<String, ScheduleRecord>,
}

impl StatusService {
    /// Build the lookup. A repeated course id keeps the last record seen.
    pub fn new(schedules: impl IntoIterator<Item = ScheduleRecord>) -> Self {
        let mut book = IndexMap::new();
        for schedule in schedules {
            if let Some(previous) = book.insert(schedule.course_id.clone(), schedule) {
                warn!(course_id = %previous.course_id, "Duplicate course schedule, keeping the later entry");
            }
        }
        Self { schedules: book }
    }

    pub fn schedule(&self, course_id: &str) -> Option<&ScheduleRecord> {
        self.schedules.get(course_id)
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    /// Classify every enrollment with a matching schedule, in input order.
    /// Enrollments for unscheduled courses are dropped.
    pub fn classify_all(
        &self,
        enrollments: &[EnrollmentRecord],
        as_of: NaiveDateTime,
    ) -> Vec<ClassifiedStatus> {
        enrollments
            .iter()
            .filter_map(|enrollment| {
                self.schedule(&enrollment.course_id)
                    .map(|schedule| evaluate(enrollment, schedule, as_of))
            })
            .collect()
    }

    /// Only the overdue, uncompleted courses.
    pub fn reminders_only(
        &self,
        enrollments: &[EnrollmentRecord],
        as_of: NaiveDateTime,
    ) -> Vec<ClassifiedStatus> {
        self.classify_all(enrollments, as_of)
            .into_iter()
            .filter(ClassifiedStatus::needs_reminder)
            .collect()
    }

    pub fn summarize(&self, enrollments: &[EnrollmentRecord], as_of: NaiveDateTime) -> UserSummary {
        summarize_statuses(&self.classify_all(enrollments, as_of))
    }

    /// Like [`classify_all`](Self::classify_all), but every scheduled
    /// enrollment must satisfy the record invariants first. Unscheduled
    /// enrollments are dropped before the check and never fail the user.
    pub fn classify_user(
        &self,
        enrollments: &[EnrollmentRecord],
        as_of: NaiveDateTime,
    ) -> Result<Vec<ClassifiedStatus>, UserError> {
        enrollments
            .iter()
            .filter_map(|enrollment| {
                self.schedule(&enrollment.course_id)
                    .map(|schedule| (enrollment, schedule))
            })
            .map(|(enrollment, schedule)| {
                enrollment
                    .validate()
                    .map_err(|reason| UserError::InvalidEnrollment {
                        course_id: enrollment.course_id.clone(),
                        reason: reason.to_string(),
                    })?;
                Ok(evaluate(enrollment, schedule, as_of))
            })
            .collect()
    }

    pub fn summarize_user(
        &self,
        enrollments: &[EnrollmentRecord],
        as_of: NaiveDateTime,
    ) -> Result<UserSummary, UserError> {
        Ok(summarize_statuses(&self.classify_user(enrollments, as_of)?))
    }
}

/// Why one user's records could not be classified.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error("enrollment for course '{course_id}' is invalid: {reason}")]
    InvalidEnrollment { course_id: String, reason: String },
}

/// Tally already-classified statuses into a [`UserSummary`].
pub fn summarize_statuses(statuses: &[ClassifiedStatus]) -> UserSummary {
    let mut summary = UserSummary {
        total_courses: statuses.len(),
        ..UserSummary::default()
    };

    for status in statuses {
        match status.status {
            ScheduleStatus::Completed => summary.completed += 1,
            ScheduleStatus::NeedsReminder => summary.needs_reminder += 1,
            ScheduleStatus::Progressed | ScheduleStatus::Started => {
                summary.in_progress += 1;
                if status.days_overdue == 0 {
                    summary.on_track += 1;
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn schedule(course_id: &str, days_to_complete: u32) -> ScheduleRecord {
        ScheduleRecord {
            course_id: course_id.to_string(),
            days_to_complete,
            batch: 0,
        }
    }

    fn enrollment(
        course_id: &str,
        status: EnrollmentStatus,
        enrolled: NaiveDateTime,
        started: Option<NaiveDateTime>,
        completed: Option<NaiveDateTime>,
    ) -> EnrollmentRecord {
        EnrollmentRecord {
            course_id: course_id.to_string(),
            status,
            enrollment_date: enrolled,
            start_date: started,
            completion_date: completed,
        }
    }

    #[test]
    fn test_in_progress_then_overdue_scenario() {
        let c1 = schedule("C1", 2);
        let e = enrollment(
            "C1",
            EnrollmentStatus::InProgress,
            day(2025, 1, 1),
            Some(day(2025, 1, 1)),
            None,
        );

        let on_time = evaluate(&e, &c1, day(2025, 1, 3));
        assert_eq!(on_time.status, ScheduleStatus::Progressed);
        assert_eq!(on_time.days_overdue, 0);
        assert_eq!(on_time.message, "In progress - 0 days remaining");

        let late = evaluate(&e, &c1, day(2025, 1, 4));
        assert_eq!(late.status, ScheduleStatus::NeedsReminder);
        assert_eq!(late.days_overdue, 1);
        assert_eq!(late.message, "In progress but overdue - 1 days overdue");
    }

    #[test]
    fn test_deadline_boundary_is_exclusive() {
        for allotted in [0u32, 1, 7, 30] {
            let s = schedule("C", allotted);
            let enrolled = day(2025, 2, 1);
            let e = enrollment("C", EnrollmentStatus::Enrolled, enrolled, None, None);

            let at_deadline = evaluate(&e, &s, enrolled + Duration::days(allotted as i64));
            assert_eq!(at_deadline.status, ScheduleStatus::Started);
            assert_eq!(at_deadline.days_overdue, 0);

            let after = evaluate(&e, &s, enrolled + Duration::days(allotted as i64 + 1));
            assert_eq!(after.status, ScheduleStatus::NeedsReminder);
            assert_eq!(after.days_overdue, 1);
        }
    }

    #[test]
    fn test_completion_wins_over_lateness() {
        let s = schedule("C1", 2);
        let e = enrollment(
            "C1",
            EnrollmentStatus::Completed,
            day(2025, 1, 1),
            Some(day(2025, 1, 1)),
            Some(day(2025, 1, 1) + Duration::minutes(654)),
        );

        for as_of in [day(2025, 1, 1), day(2025, 1, 15), day(2026, 6, 1)] {
            let status = evaluate(&e, &s, as_of);
            assert_eq!(status.status, ScheduleStatus::Completed);
            assert_eq!(status.days_overdue, 0);
            assert_eq!(status.message, "Completed on 2025-01-01");
        }
    }

    #[test]
    fn test_overdue_not_started() {
        let s = schedule("COURSE_002", 2);
        let e = enrollment(
            "COURSE_002",
            EnrollmentStatus::Enrolled,
            day(2025, 1, 1),
            None,
            None,
        );
        let status = evaluate(&e, &s, day(2025, 1, 15));
        assert_eq!(status.status, ScheduleStatus::NeedsReminder);
        assert_eq!(status.days_overdue, 12);
        assert_eq!(status.message, "Not started - 12 days overdue");
    }

    #[test]
    fn test_started_but_not_marked_in_progress() {
        let s = schedule("C1", 10);
        let e = enrollment(
            "C1",
            EnrollmentStatus::Enrolled,
            day(2025, 1, 1),
            Some(day(2025, 1, 2)),
            None,
        );
        let status = evaluate(&e, &s, day(2025, 1, 4));
        assert_eq!(status.status, ScheduleStatus::Started);
        assert_eq!(status.message, "Started - 7 days remaining");
    }

    #[test]
    fn test_enrolled_not_started_within_deadline() {
        let s = schedule("C1", 5);
        let e = enrollment("C1", EnrollmentStatus::Enrolled, day(2025, 1, 1), None, None);
        let status = evaluate(&e, &s, day(2025, 1, 2));
        assert_eq!(status.status, ScheduleStatus::Started);
        assert_eq!(status.message, "Enrolled - 4 days to start and complete");
    }

    #[test]
    fn test_partial_days_are_discarded() {
        let s = schedule("C1", 1);
        let enrolled = day(2025, 1, 1) + Duration::hours(10);
        let e = enrollment("C1", EnrollmentStatus::Enrolled, enrolled, None, None);
        // 1 day 23 hours elapsed: still on the deadline day
        let status = evaluate(&e, &s, enrolled + Duration::hours(47));
        assert_eq!(status.status, ScheduleStatus::Started);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let s = schedule("C1", 3);
        let e = enrollment(
            "C1",
            EnrollmentStatus::InProgress,
            day(2025, 1, 1),
            Some(day(2025, 1, 2)),
            None,
        );
        let as_of = day(2025, 1, 9);
        assert_eq!(evaluate(&e, &s, as_of), evaluate(&e, &s, as_of));
    }

    #[test]
    fn test_reminder_implies_not_completed() {
        let service = StatusService::new(vec![schedule("A", 1), schedule("B", 3), schedule("C", 0)]);
        let statuses = [EnrollmentStatus::Enrolled, EnrollmentStatus::InProgress, EnrollmentStatus::Completed];
        let mut enrollments = Vec::new();
        for course in ["A", "B", "C"] {
            for status in statuses {
                let completed = (status == EnrollmentStatus::Completed).then(|| day(2025, 1, 20));
                enrollments.push(enrollment(course, status, day(2025, 1, 1), None, completed));
            }
        }

        for as_of in [day(2025, 1, 1), day(2025, 1, 3), day(2025, 3, 1)] {
            for classified in service.classify_all(&enrollments, as_of) {
                if classified.needs_reminder() {
                    assert!(!classified.enrollment.unwrap().is_completed());
                } else {
                    assert_eq!(classified.days_overdue, 0);
                }
            }
        }
    }

    #[test]
    fn test_unscheduled_course_is_dropped() {
        let service = StatusService::new(vec![schedule("C1", 2), schedule("C2", 2)]);
        let enrollments = vec![
            enrollment("C1", EnrollmentStatus::Enrolled, day(2025, 1, 1), None, None),
            enrollment("ELECTIVE", EnrollmentStatus::Enrolled, day(2025, 1, 1), None, None),
            enrollment("C2", EnrollmentStatus::Enrolled, day(2025, 1, 1), None, None),
        ];
        let classified = service.classify_all(&enrollments, day(2025, 1, 2));
        assert_eq!(classified.len(), enrollments.len() - 1);
        assert_eq!(classified[0].course_id, "C1");
        assert_eq!(classified[1].course_id, "C2");
    }

    #[test]
    fn test_summary_counts_only_scheduled_courses() {
        let service = StatusService::new(vec![schedule("C1", 2), schedule("C2", 2)]);
        let enrollments = vec![
            enrollment(
                "C1",
                EnrollmentStatus::Completed,
                day(2025, 1, 1),
                Some(day(2025, 1, 1)),
                Some(day(2025, 1, 2)),
            ),
            // overdue but unscheduled, must not be counted
            enrollment("UNLISTED", EnrollmentStatus::Enrolled, day(2024, 1, 1), None, None),
            enrollment("C2", EnrollmentStatus::Enrolled, day(2025, 1, 1), None, None),
        ];

        let summary = service.summarize(&enrollments, day(2025, 1, 10));
        assert_eq!(summary.total_courses, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.needs_reminder, 1);
        assert_eq!(summary.in_progress, 0);

        let reminders = service.reminders_only(&enrollments, day(2025, 1, 10));
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].course_id, "C2");
    }

    #[test]
    fn test_every_in_progress_entry_is_on_track() {
        let service = StatusService::new(vec![schedule("C1", 5), schedule("C2", 5), schedule("C3", 1)]);
        let enrollments = vec![
            enrollment("C1", EnrollmentStatus::InProgress, day(2025, 1, 1), Some(day(2025, 1, 1)), None),
            enrollment("C2", EnrollmentStatus::Enrolled, day(2025, 1, 1), None, None),
            enrollment("C3", EnrollmentStatus::Enrolled, day(2025, 1, 1), None, None),
        ];
        let summary = service.summarize(&enrollments, day(2025, 1, 4));
        assert_eq!(summary.in_progress, 2);
        assert_eq!(summary.on_track, summary.in_progress);
        assert_eq!(summary.needs_reminder, 1);
    }

    #[test]
    fn test_duplicate_schedule_keeps_last() {
        let service = StatusService::new(vec![schedule("C1", 2), schedule("C1", 9)]);
        assert_eq!(service.len(), 1);
        assert_eq!(service.schedule("C1").unwrap().days_to_complete, 9);
    }

    #[test]
    fn test_classify_user_rejects_broken_scheduled_record() {
        let service = StatusService::new(vec![schedule("C1", 2), schedule("C2", 2)]);
        let enrollments = vec![
            enrollment("C1", EnrollmentStatus::Enrolled, day(2025, 1, 1), None, None),
            enrollment("C2", EnrollmentStatus::Completed, day(2025, 1, 1), None, None),
        ];
        let err = service.classify_user(&enrollments, day(2025, 1, 10)).unwrap_err();
        assert_eq!(
            err,
            UserError::InvalidEnrollment {
                course_id: "C2".to_string(),
                reason: "marked Completed without a completion date".to_string(),
            }
        );
        assert!(service.summarize_user(&enrollments, day(2025, 1, 10)).is_err());
    }

    #[test]
    fn test_classify_user_ignores_broken_unscheduled_record() {
        let service = StatusService::new(vec![schedule("C1", 2)]);
        let enrollments = vec![
            enrollment("C1", EnrollmentStatus::Enrolled, day(2025, 1, 1), None, None),
            enrollment(
                "ELECTIVE",
                EnrollmentStatus::InProgress,
                day(2025, 1, 1),
                Some(day(2025, 1, 1)),
                Some(day(2025, 1, 2)),
            ),
        ];
        let classified = service.classify_user(&enrollments, day(2025, 1, 10)).unwrap();
        assert_eq!(classified, service.classify_all(&enrollments, day(2025, 1, 10)));
        assert_eq!(classified.len(), 1);
        assert!(classified[0].needs_reminder());

        let summary = service.summarize_user(&enrollments, day(2025, 1, 10)).unwrap();
        assert_eq!(summary.needs_reminder, 1);
    }
}
