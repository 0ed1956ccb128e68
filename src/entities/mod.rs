pub mod lessons;
pub mod students;
pub mod users;

pub use lessons as lesson_entity;
pub use lessons::{LessonStatus, LessonType, Subject};
pub use students as student_entity;
pub use users as user_entity;
