pub mod auth;
pub mod events;
pub mod lesson;
pub mod statistics;
pub mod student;

pub use auth::auth_config;
pub use events::events_config;
pub use lesson::lesson_config;
pub use statistics::statistics_config;
pub use student::student_config;
