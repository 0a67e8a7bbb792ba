use chrono::NaiveDate;
use serde::Serialize;

use crate::color::{ColorCategory, CoursePalette};
use crate::models::{ActivityWithSubtasks, Course, Subtask};
use crate::today::NO_COURSE;

pub const RECENT_WINS_LIMIT: usize = 5;
pub const UPCOMING_LIMIT: usize = 4;
pub const NO_DEADLINE_LABEL: &str = "Sin fecha límite";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineClass {
    Overdue,
    Urgent,
    Normal,
    NoDeadline,
}

impl DeadlineClass {
    pub fn from_days_left(days_left: Option<i64>) -> Self {
        match days_left {
            None => DeadlineClass::NoDeadline,
            Some(d) if d < 0 => DeadlineClass::Overdue,
            Some(d) if d <= 3 => DeadlineClass::Urgent,
            Some(_) => DeadlineClass::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineTone {
    Critical,
    Warning,
    Calm,
    Muted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressBadge {
    Behind,
    Completed,
    InProgress,
}

impl ProgressBadge {
    pub fn label(self) -> &'static str {
        match self {
            ProgressBadge::Behind => "Retrasado",
            ProgressBadge::Completed => "Completado",
            ProgressBadge::InProgress => "En curso",
        }
    }
}

/// Course filter of the progress page. Global numbers ignore it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProgressFilter {
    #[default]
    All,
    Course(String),
}

impl ProgressFilter {
    /// `None`, empty and `"all"` select every course.
    pub fn from_query(course: Option<&str>) -> Self {
        match course.map(str::trim) {
            None | Some("") => ProgressFilter::All,
            Some(name) if name.eq_ignore_ascii_case("all") => ProgressFilter::All,
            Some(name) => ProgressFilter::Course(name.to_string()),
        }
    }

    fn matches(&self, course: &str) -> bool {
        match self {
            ProgressFilter::All => true,
            ProgressFilter::Course(name) => name == course,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityProgress {
    pub activity_id: i64,
    pub title: String,
    pub course: String,
    pub course_color: ColorCategory,
    pub deadline: Option<NaiveDate>,
    pub completed_count: usize,
    pub total_count: usize,
    pub percent: u32,
    pub days_left: Option<i64>,
    pub class: DeadlineClass,
    pub is_behind: bool,
    pub badge: ProgressBadge,
    pub deadline_label: String,
    pub deadline_tone: DeadlineTone,
    pub total_hours: f64,
    pub done_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentWin {
    pub subtask: Subtask,
    pub course: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub overall_progress: u32,
    pub total_hours_done: f64,
    pub recent_wins: Vec<RecentWin>,
    pub upcoming: Vec<ActivityProgress>,
    pub activities: Vec<ActivityProgress>,
    /// Distinct course names, in activity order, for the filter control.
    pub courses: Vec<String>,
}

/// `round(part / whole * 100)`, zero for an empty whole.
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

/// Whole calendar days from `today` to `deadline`.
pub fn days_left(deadline: NaiveDate, today: NaiveDate) -> i64 {
    deadline.signed_duration_since(today).num_days()
}

pub fn deadline_label(deadline: Option<NaiveDate>, days_left: Option<i64>) -> String {
    match (deadline, days_left) {
        (Some(date), Some(days)) => match days {
            d if d < 0 => "Atrasado".to_string(),
            0 => "Hoy (Urgente)".to_string(),
            1 => "Mañana (Urgente)".to_string(),
            d if d <= 3 => format!("{} días restantes", d),
            _ => date.format("%b %-d, %Y").to_string(),
        },
        _ => NO_DEADLINE_LABEL.to_string(),
    }
}

pub fn deadline_tone(days_left: Option<i64>, percent: u32) -> DeadlineTone {
    match days_left {
        None => DeadlineTone::Muted,
        Some(d) if d < 0 || (d <= 3 && percent < 50) => DeadlineTone::Critical,
        Some(d) if d <= 5 => DeadlineTone::Warning,
        Some(_) => DeadlineTone::Calm,
    }
}

pub fn activity_progress(item: &ActivityWithSubtasks, palette: &CoursePalette, today: NaiveDate) -> ActivityProgress {
    let activity = &item.activity;
    let (course, course_color) = match &activity.course {
        Some(course) => {
            let name = course.resolve(palette.courses()).name;
            let name = if name.is_empty() { NO_COURSE.to_string() } else { name };
            (name, palette.color_of(course))
        }
        None => (NO_COURSE.to_string(), ColorCategory::default()),
    };

    let completed_count = item.subtasks.iter().filter(|s| s.status.is_done()).count();
    let total_count = item.subtasks.len();
    let pct = percent(completed_count, total_count);

    let deadline = activity.deadline_date();
    let days = deadline.map(|d| days_left(d, today));
    let is_behind = pct < 50 && days.is_some_and(|d| d <= 5);
    let badge = if is_behind {
        ProgressBadge::Behind
    } else if pct == 100 {
        ProgressBadge::Completed
    } else {
        ProgressBadge::InProgress
    };

    ActivityProgress {
        activity_id: activity.id,
        title: activity.title.clone(),
        course,
        course_color,
        deadline,
        completed_count,
        total_count,
        percent: pct,
        days_left: days,
        class: DeadlineClass::from_days_left(days),
        is_behind,
        badge,
        deadline_label: deadline_label(deadline, days),
        deadline_tone: deadline_tone(days, pct),
        total_hours: item.subtasks.iter().map(|s| s.estimated_hours).sum(),
        done_hours: done_hours(&item.subtasks),
    }
}

fn done_hours(subtasks: &[Subtask]) -> f64 {
    subtasks
        .iter()
        .filter(|s| s.status.is_done())
        .map(|s| s.estimated_hours)
        .sum()
}

pub fn build_progress(
    items: &[ActivityWithSubtasks],
    courses: &[Course],
    today: NaiveDate,
    filter: &ProgressFilter,
) -> ProgressSummary {
    let palette = CoursePalette::new(courses);
    let all: Vec<ActivityProgress> = items
        .iter()
        .map(|item| activity_progress(item, &palette, today))
        .collect();

    let total_done: usize = all.iter().map(|p| p.completed_count).sum();
    let total_all: usize = all.iter().map(|p| p.total_count).sum();
    let total_hours_done: f64 = all.iter().map(|p| p.done_hours).sum();

    let recent_wins: Vec<RecentWin> = items
        .iter()
        .zip(&all)
        .flat_map(|(item, progress)| {
            item.subtasks
                .iter()
                .filter(|s| s.status.is_done())
                .map(move |s| RecentWin {
                    subtask: s.clone(),
                    course: progress.course.clone(),
                })
        })
        .take(RECENT_WINS_LIMIT)
        .collect();

    let mut upcoming: Vec<ActivityProgress> = all
        .iter()
        .filter(|p| p.days_left.is_some_and(|d| d >= 0))
        .cloned()
        .collect();
    // Stable sort keeps activity order among equal deadlines.
    upcoming.sort_by_key(|p| p.days_left);
    upcoming.truncate(UPCOMING_LIMIT);

    let mut course_names: Vec<String> = Vec::new();
    for progress in &all {
        if !course_names.contains(&progress.course) {
            course_names.push(progress.course.clone());
        }
    }

    let activities = all.into_iter().filter(|p| filter.matches(&p.course)).collect();

    ProgressSummary {
        overall_progress: percent(total_done, total_all),
        total_hours_done,
        recent_wins,
        upcoming,
        activities,
        courses: course_names,
    }
}
