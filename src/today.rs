use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::color::{ColorCategory, CoursePalette};
use crate::models::{Activity, ActivityRef, Course, CourseRef, Subtask};

pub const NO_COURSE: &str = "Sin curso";
pub const NO_TITLE: &str = "Sin título";

pub struct TodayInput<'a> {
    pub activities: &'a [Activity],
    pub subtasks: &'a [Subtask],
    pub courses: &'a [Course],
    /// Local calendar day, `YYYY-MM-DD`.
    pub today: &'a str,
    pub daily_limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedActivity {
    pub activity_id: i64,
    pub title: String,
    pub course: String,
    pub course_color: ColorCategory,
    pub subtasks: Vec<Subtask>,
}

impl GroupedActivity {
    pub fn remaining_hours(&self) -> f64 {
        self.subtasks.iter().map(Subtask::remaining_hours).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseFocus {
    pub course: String,
    pub hours: f64,
    pub color: ColorCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodayView {
    pub today: String,
    pub subtasks: Vec<Subtask>,
    pub grouped: Vec<GroupedActivity>,
    pub by_course: Vec<CourseFocus>,
    pub total_hours: f64,
    pub daily_limit: f64,
    pub is_overloaded: bool,
    pub progress_percent: f64,
    /// Hours above the limit, zero when not overloaded.
    pub hours_over_limit: f64,
}

impl TodayView {
    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }
}

pub fn build_today_view(input: &TodayInput<'_>) -> TodayView {
    let palette = CoursePalette::new(input.courses);
    let activities: HashMap<i64, &Activity> = input.activities.iter().map(|a| (a.id, a)).collect();

    let todays: Vec<Subtask> = input
        .subtasks
        .iter()
        .filter(|s| s.is_due_on(input.today))
        .cloned()
        .collect();

    let mut groups: BTreeMap<i64, GroupedActivity> = BTreeMap::new();
    for subtask in &todays {
        let Some(activity_id) = subtask.activity_id() else {
            continue;
        };
        groups
            .entry(activity_id)
            .or_insert_with(|| new_group(activity_id, subtask, activities.get(&activity_id).copied(), &palette))
            .subtasks
            .push(subtask.clone());
    }
    let grouped: Vec<GroupedActivity> = groups.into_values().collect();
    // Subtasks without a parent activity have no group, so they stay out of
    // the totals too.
    let total_hours: f64 = grouped.iter().map(GroupedActivity::remaining_hours).sum();

    let mut by_course: Vec<CourseFocus> = Vec::new();
    for group in &grouped {
        let hours = group.remaining_hours();
        if hours <= 0.0 {
            continue;
        }
        match by_course.iter_mut().find(|f| f.course == group.course) {
            Some(focus) => focus.hours += hours,
            None => by_course.push(CourseFocus {
                course: group.course.clone(),
                hours,
                color: group.course_color,
            }),
        }
    }

    let daily_limit = input.daily_limit;
    let is_overloaded = total_hours > daily_limit;
    let progress_percent = if daily_limit > 0.0 {
        (total_hours / daily_limit * 100.0).min(100.0)
    } else if total_hours > 0.0 {
        100.0
    } else {
        0.0
    };
    let hours_over_limit = if is_overloaded { total_hours - daily_limit } else { 0.0 };

    TodayView {
        today: input.today.to_string(),
        subtasks: todays,
        grouped,
        by_course,
        total_hours,
        daily_limit,
        is_overloaded,
        progress_percent,
        hours_over_limit,
    }
}

fn new_group(
    activity_id: i64,
    first: &Subtask,
    activity: Option<&Activity>,
    palette: &CoursePalette,
) -> GroupedActivity {
    let embedded = match &first.activity {
        Some(ActivityRef::Embedded(summary)) => Some(summary),
        _ => None,
    };

    // An embedded activity on the subtask names the course; otherwise the
    // fetched activity does. The color always follows the fetched activity.
    let course_ref: Option<&CourseRef> = embedded
        .and_then(|s| s.course.as_ref())
        .or_else(|| activity.and_then(|a| a.course.as_ref()));
    let course = course_ref
        .map(|c| c.resolve(palette.courses()).name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| NO_COURSE.to_string());

    let color_ref = activity
        .and_then(|a| a.course.as_ref())
        .or_else(|| embedded.and_then(|s| s.course.as_ref()));
    let course_color = color_ref.map(|c| palette.color_of(c)).unwrap_or_default();

    let title = activity
        .map(|a| a.title.clone())
        .or_else(|| embedded.and_then(|s| s.title.clone()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());

    GroupedActivity {
        activity_id,
        title,
        course,
        course_color,
        subtasks: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivitySummary, ActivityType, SubtaskStatus};

    const TODAY: &str = "2025-05-02";

    fn course(id: i64, name: &str) -> Course {
        Course { id, name: name.to_string() }
    }

    fn activity(id: i64, title: &str, course_id: Option<i64>) -> Activity {
        Activity {
            id,
            title: title.to_string(),
            description: None,
            course: course_id.map(CourseRef::Id),
            kind: ActivityType::Examen,
            deadline: Some("2025-05-09".to_string()),
            event_datetime: None,
        }
    }

    fn subtask(id: i64, activity: i64, hours: f64, date: &str, status: SubtaskStatus) -> Subtask {
        Subtask {
            id,
            title: format!("st-{}", id),
            activity: Some(ActivityRef::Id(activity)),
            status,
            estimated_hours: hours,
            target_date: Some(date.to_string()),
            execution_note: None,
        }
    }

    fn view(activities: &[Activity], subtasks: &[Subtask], courses: &[Course], limit: f64) -> TodayView {
        build_today_view(&TodayInput {
            activities,
            subtasks,
            courses,
            today: TODAY,
            daily_limit: limit,
        })
    }

    #[test]
    fn overload_scenario() {
        let courses = vec![course(1, "Cálculo II"), course(2, "Historia 301")];
        let activities = vec![activity(10, "Parcial", Some(1)), activity(11, "Ensayo", Some(2))];
        let subtasks = vec![
            subtask(1, 10, 3.0, TODAY, SubtaskStatus::Pending),
            subtask(2, 10, 1.5, "2025-05-02T08:00:00Z", SubtaskStatus::Pending),
            subtask(3, 11, 3.0, TODAY, SubtaskStatus::Waiting),
            subtask(4, 11, 2.0, TODAY, SubtaskStatus::Done),
            subtask(5, 11, 4.0, "2025-05-03", SubtaskStatus::Pending),
        ];

        let today = view(&activities, &subtasks, &courses, 6.0);

        assert_eq!(today.total_hours, 7.5);
        assert!(today.is_overloaded);
        assert_eq!(today.progress_percent, 100.0);
        assert_eq!(today.hours_over_limit, 1.5);
        assert_eq!(today.subtasks.len(), 4);
        assert_eq!(today.grouped.len(), 2);
        assert_eq!(today.grouped[0].title, "Parcial");
        assert_eq!(today.grouped[0].course, "Cálculo II");
        assert_eq!(today.grouped[1].subtasks.len(), 3);
    }

    #[test]
    fn empty_day() {
        let activities = vec![activity(10, "Parcial", None)];
        let subtasks = vec![
            subtask(1, 10, 3.0, "2025-05-01", SubtaskStatus::Pending),
            Subtask {
                target_date: None,
                ..subtask(2, 10, 1.0, TODAY, SubtaskStatus::Pending)
            },
        ];

        let today = view(&activities, &subtasks, &[], 6.0);

        assert!(today.is_empty());
        assert!(today.grouped.is_empty());
        assert!(today.by_course.is_empty());
        assert_eq!(today.total_hours, 0.0);
        assert!(!today.is_overloaded);
        assert_eq!(today.progress_percent, 0.0);
    }

    #[test]
    fn course_hours_sum_across_activities_in_any_order() {
        let courses = vec![course(1, "Cálculo II")];
        let mut activities = vec![activity(10, "Parcial", Some(1)), activity(11, "Taller 3", Some(1))];
        let mut subtasks = vec![
            subtask(1, 10, 2.0, TODAY, SubtaskStatus::Pending),
            subtask(2, 11, 1.5, TODAY, SubtaskStatus::Pending),
            subtask(3, 11, 0.5, TODAY, SubtaskStatus::Pending),
        ];

        let forward = view(&activities, &subtasks, &courses, 6.0);
        activities.reverse();
        subtasks.reverse();
        let backward = view(&activities, &subtasks, &courses, 6.0);

        for today in [forward, backward] {
            assert_eq!(today.by_course.len(), 1);
            assert_eq!(today.by_course[0].course, "Cálculo II");
            assert_eq!(today.by_course[0].hours, 4.0);
            let per_activity: f64 = today.grouped.iter().map(GroupedActivity::remaining_hours).sum();
            assert_eq!(per_activity, today.by_course[0].hours);
        }
    }

    #[test]
    fn marking_done_never_increases_remaining_hours() {
        let activities = vec![activity(10, "Parcial", None)];
        let mut subtasks = vec![
            subtask(1, 10, 2.0, TODAY, SubtaskStatus::Pending),
            subtask(2, 10, 1.0, TODAY, SubtaskStatus::Pending),
        ];

        let before = view(&activities, &subtasks, &[], 6.0).total_hours;
        subtasks[0].status = SubtaskStatus::Done;
        let done = view(&activities, &subtasks, &[], 6.0).total_hours;
        subtasks[0].status = SubtaskStatus::Pending;
        let restored = view(&activities, &subtasks, &[], 6.0).total_hours;

        assert!(done <= before);
        assert_eq!(done, 1.0);
        assert_eq!(restored, before);
    }

    #[test]
    fn fully_done_activity_adds_no_course_focus() {
        let courses = vec![course(1, "Física 101")];
        let activities = vec![activity(10, "Laboratorio", Some(1))];
        let subtasks = vec![subtask(1, 10, 2.0, TODAY, SubtaskStatus::Done)];

        let today = view(&activities, &subtasks, &courses, 6.0);

        assert_eq!(today.grouped.len(), 1);
        assert!(today.by_course.is_empty());
    }

    #[test]
    fn same_course_gets_same_color_and_missing_course_falls_back() {
        let courses = vec![course(1, "Cálculo II"), course(2, "Historia 301")];
        let activities = vec![
            activity(10, "Parcial", Some(2)),
            activity(11, "Quiz 4", Some(2)),
            activity(12, "", None),
        ];
        let subtasks = vec![
            subtask(1, 10, 1.0, TODAY, SubtaskStatus::Pending),
            subtask(2, 11, 1.0, TODAY, SubtaskStatus::Pending),
            subtask(3, 12, 1.0, TODAY, SubtaskStatus::Pending),
        ];

        let today = view(&activities, &subtasks, &courses, 6.0);

        assert_eq!(today.grouped[0].course_color, today.grouped[1].course_color);
        assert_eq!(today.grouped[2].course, NO_COURSE);
        assert_eq!(today.grouped[2].title, NO_TITLE);
        assert_eq!(today.grouped[2].course_color, ColorCategory::Cyan);
    }

    #[test]
    fn embedded_activity_names_the_course() {
        let courses = vec![course(1, "Cálculo II")];
        let subtasks = vec![Subtask {
            activity: Some(ActivityRef::Embedded(ActivitySummary {
                id: 42,
                title: Some("Proyecto final".to_string()),
                course: Some(CourseRef::Embedded(course(1, "Cálculo II"))),
            })),
            ..subtask(1, 0, 2.0, TODAY, SubtaskStatus::Pending)
        }];

        let today = view(&[], &subtasks, &courses, 6.0);

        assert_eq!(today.grouped[0].activity_id, 42);
        assert_eq!(today.grouped[0].title, "Proyecto final");
        assert_eq!(today.grouped[0].course, "Cálculo II");
    }

    #[test]
    fn zero_limit_is_full_only_when_hours_remain() {
        let activities = vec![activity(10, "Parcial", None)];
        let subtasks = vec![subtask(1, 10, 1.0, TODAY, SubtaskStatus::Pending)];

        assert_eq!(view(&activities, &subtasks, &[], 0.0).progress_percent, 100.0);
        assert_eq!(view(&activities, &[], &[], 0.0).progress_percent, 0.0);
    }

    #[test]
    fn orphan_subtasks_stay_out_of_the_totals() {
        let courses = vec![course(1, "Cálculo II")];
        let activities = vec![activity(10, "Parcial", Some(1))];
        let subtasks = vec![
            subtask(1, 10, 2.0, TODAY, SubtaskStatus::Pending),
            Subtask {
                activity: None,
                ..subtask(2, 10, 5.0, TODAY, SubtaskStatus::Pending)
            },
        ];

        let today = view(&activities, &subtasks, &courses, 6.0);

        assert_eq!(today.total_hours, 2.0);
        assert!(!today.is_overloaded);
        assert_eq!(today.grouped.len(), 1);
        assert_eq!(today.by_course[0].hours, 2.0);
    }
}
