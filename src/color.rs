use serde::{Deserialize, Serialize};

use crate::models::{Course, CourseRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorCategory {
    #[default]
    Cyan,
    Orange,
    Green,
    Blue,
    Purple,
    Red,
    Yellow,
}

pub const PALETTE: [ColorCategory; 7] = [
    ColorCategory::Cyan,
    ColorCategory::Orange,
    ColorCategory::Green,
    ColorCategory::Blue,
    ColorCategory::Purple,
    ColorCategory::Red,
    ColorCategory::Yellow,
];

/// Deterministic color for a course: the sum of the UTF-16 code units of the
/// id picks the palette slot; an empty id falls back to the list position.
/// The name does not take part in the choice.
pub fn assign_color(course_id: &str, _course_name: &str, position: usize) -> ColorCategory {
    let slot = if course_id.is_empty() {
        position
    } else {
        course_id.encode_utf16().map(usize::from).sum()
    };
    PALETTE[slot % PALETTE.len()]
}

/// Colors for one fetched course list, so every view in a pass agrees.
#[derive(Debug, Clone, Default)]
pub struct CoursePalette {
    courses: Vec<Course>,
    colors: Vec<ColorCategory>,
}

impl CoursePalette {
    pub fn new(courses: &[Course]) -> Self {
        let colors = courses
            .iter()
            .enumerate()
            .map(|(idx, course)| assign_color(&course.id.to_string(), &course.name, idx))
            .collect();
        Self {
            courses: courses.to_vec(),
            colors,
        }
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn color_of(&self, course: &CourseRef) -> ColorCategory {
        let resolved = course.resolve(&self.courses);
        match (resolved.id, resolved.position) {
            (_, Some(idx)) => self.colors[idx],
            (Some(id), None) => assign_color(&id.to_string(), &resolved.name, 0),
            (None, None) => ColorCategory::default(),
        }
    }
}
