use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{LessonStatus, LessonType, Subject};
use crate::external::StatusChangeEvent;
use crate::handlers;
use crate::models::*;
use crate::utils::pagination::PaginationInfo;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::me,
        handlers::student::list_students,
        handlers::student::get_student,
        handlers::student::create_student,
        handlers::student::update_student,
        handlers::student::delete_student,
        handlers::lesson::list_lessons,
        handlers::lesson::upcoming_lessons,
        handlers::lesson::get_lesson,
        handlers::lesson::create_lesson,
        handlers::lesson::update_lesson,
        handlers::lesson::cancel_lesson,
        handlers::lesson::restore_lesson,
        handlers::lesson::reschedule_lesson,
        handlers::lesson::delete_lesson,
        handlers::lesson::refresh_statuses,
        handlers::statistics::summary,
        handlers::statistics::by_subject,
        handlers::statistics::by_lesson_type,
        handlers::statistics::by_student,
        handlers::events::lesson_events,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            UserResponse,
            AuthResponse,
            CreateStudentRequest,
            UpdateStudentRequest,
            StudentResponse,
            StudentDetailResponse,
            StudentBrief,
            CreateLessonRequest,
            UpdateLessonRequest,
            RescheduleLessonRequest,
            DeleteLessonRequest,
            LessonResponse,
            LessonListResponse,
            CreateLessonResponse,
            StatisticsQuery,
            StatisticsResponse,
            SubjectStat,
            LessonTypeStat,
            StudentStat,
            Subject,
            LessonType,
            LessonStatus,
            StatusChangeEvent,
            PaginationInfo,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Tutor accounts and sessions"),
        (name = "students", description = "Student roster"),
        (name = "lessons", description = "Lesson scheduling and lifecycle"),
        (name = "statistics", description = "Earnings and lesson statistics"),
        (name = "events", description = "Lesson status event stream"),
    ),
    info(
        title = "Tutorly Backend API",
        version = "1.0.0",
        description = "Scheduling and billing backend for individual tutors"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
