pub mod activity;
pub mod course;
pub mod reprogramming_log;
pub mod subtask;

pub use activity::{Activity, ActivityPatch, ActivitySummary, ActivityType, ActivityWithSubtasks, NewActivityRequest};
pub use course::{Course, CoursePatch, CourseRef, NewCourseRequest, ResolvedCourse};
pub use reprogramming_log::{NewReprogrammingLog, ReprogrammingLog, ReprogrammingLogPatch};
pub use subtask::{ActivityRef, NewSubtaskRequest, Subtask, SubtaskPatch, SubtaskStatus};
