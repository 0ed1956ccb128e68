pub mod auth_service;
pub mod lesson_service;
pub mod recurring_service;
pub mod statistics_service;
pub mod status_service;
pub mod student_service;
pub mod tutor_locks;

pub use auth_service::AuthService;
pub use lesson_service::LessonService;
pub use recurring_service::RecurringService;
pub use statistics_service::StatisticsService;
pub use status_service::{StatusService, SweepOutcome};
pub use student_service::StudentService;
pub use tutor_locks::TutorLocks;
