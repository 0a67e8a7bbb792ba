use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCourseRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoursePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The backend is not consistent about how an activity points at its
/// course: sometimes the full object, sometimes the id, sometimes the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CourseRef {
    Embedded(Course),
    Id(i64),
    Name(String),
}

/// A course reference after looking it up in the fetched course list.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCourse {
    pub id: Option<i64>,
    pub name: String,
    /// Position in the course list, when the course was found there.
    pub position: Option<usize>,
}

impl CourseRef {
    pub fn resolve(&self, courses: &[Course]) -> ResolvedCourse {
        match self {
            CourseRef::Embedded(course) => ResolvedCourse {
                id: Some(course.id),
                name: course.name.clone(),
                position: courses.iter().position(|c| c.id == course.id),
            },
            CourseRef::Id(id) => {
                let position = courses.iter().position(|c| c.id == *id);
                ResolvedCourse {
                    id: Some(*id),
                    name: position
                        .map(|idx| courses[idx].name.clone())
                        .unwrap_or_default(),
                    position,
                }
            }
            CourseRef::Name(name) => {
                let position = courses
                    .iter()
                    .position(|c| &c.name == name)
                    .or_else(|| {
                        let id = name.parse::<i64>().ok()?;
                        courses.iter().position(|c| c.id == id)
                    });
                match position {
                    Some(idx) => ResolvedCourse {
                        id: Some(courses[idx].id),
                        name: courses[idx].name.clone(),
                        position,
                    },
                    None => ResolvedCourse {
                        id: None,
                        name: name.clone(),
                        position: None,
                    },
                }
            }
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            CourseRef::Embedded(course) => Some(course.id),
            CourseRef::Id(id) => Some(*id),
            CourseRef::Name(_) => None,
        }
    }
}
