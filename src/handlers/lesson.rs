use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, ResponseError, Result};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use crate::models::*;
use crate::services::{LessonService, StatusService};

fn get_user_id_from_request(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

#[utoipa::path(
    get,
    path = "/lessons",
    tag = "lessons",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("start_date" = Option<String>, Query, description = "Earliest start time (RFC 3339)"),
        ("end_date" = Option<String>, Query, description = "Latest start time (RFC 3339)"),
        ("student_id" = Option<Uuid>, Query, description = "Filter by student"),
        ("status" = Option<String>, Query, description = "Comma-separated status list"),
        ("page" = Option<u32>, Query, description = "Page number, 1-based"),
        ("limit" = Option<u32>, Query, description = "Page size")
    ),
    responses(
        (status = 200, description = "Paginated lessons", body = LessonListResponse),
        (status = 400, description = "Unknown status value"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_lessons(
    lesson_service: web::Data<LessonService>,
    req: HttpRequest,
    query: web::Query<LessonQuery>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match lesson_service.list_lessons(tutor_id, query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/lessons/upcoming",
    tag = "lessons",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Next scheduled lessons", body = [LessonResponse]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn upcoming_lessons(
    lesson_service: web::Data<LessonService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match lesson_service.get_upcoming_lessons(tutor_id).await {
        Ok(lessons) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": lessons
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/lessons/{id}",
    tag = "lessons",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "Lesson detail", body = LessonResponse),
        (status = 404, description = "Lesson not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_lesson(
    lesson_service: web::Data<LessonService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match lesson_service.get_lesson(tutor_id, path.into_inner()).await {
        Ok(lesson) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": lesson
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/lessons",
    tag = "lessons",
    request_body = CreateLessonRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Lesson (or weekly series) created", body = CreateLessonResponse),
        (status = 409, description = "Scheduling conflict"),
        (status = 400, description = "Invalid request body"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_lesson(
    lesson_service: web::Data<LessonService>,
    req: HttpRequest,
    request: web::Json<CreateLessonRequest>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match lesson_service
        .create_lesson(tutor_id, request.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/lessons/{id}",
    tag = "lessons",
    request_body = UpdateLessonRequest,
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "Lesson updated", body = LessonResponse),
        (status = 409, description = "New time conflicts with another lesson"),
        (status = 404, description = "Lesson not found"),
        (status = 400, description = "Invalid request body")
    )
)]
pub async fn update_lesson(
    lesson_service: web::Data<LessonService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<UpdateLessonRequest>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match lesson_service
        .update_lesson(tutor_id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(lesson) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": lesson
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/lessons/{id}/cancel",
    tag = "lessons",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "Lesson cancelled, slot freed", body = LessonResponse),
        (status = 404, description = "Lesson not found"),
        (status = 400, description = "Lesson is already cancelled")
    )
)]
pub async fn cancel_lesson(
    lesson_service: web::Data<LessonService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match lesson_service
        .cancel_lesson(tutor_id, path.into_inner())
        .await
    {
        Ok(lesson) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": lesson
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/lessons/{id}/restore",
    tag = "lessons",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "Cancelled lesson restored to SCHEDULED", body = LessonResponse),
        (status = 409, description = "Slot was taken while the lesson was cancelled"),
        (status = 404, description = "Lesson not found"),
        (status = 400, description = "Lesson is not cancelled")
    )
)]
pub async fn restore_lesson(
    lesson_service: web::Data<LessonService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match lesson_service
        .restore_lesson(tutor_id, path.into_inner())
        .await
    {
        Ok(lesson) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": lesson
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/lessons/{id}/reschedule",
    tag = "lessons",
    request_body = RescheduleLessonRequest,
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "Lesson moved to the new time", body = LessonResponse),
        (status = 409, description = "New time conflicts with another lesson"),
        (status = 404, description = "Lesson not found"),
        (status = 400, description = "Lesson already completed or cancelled")
    )
)]
pub async fn reschedule_lesson(
    lesson_service: web::Data<LessonService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<RescheduleLessonRequest>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match lesson_service
        .reschedule_lesson(tutor_id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(lesson) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": lesson
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/lessons/{id}",
    tag = "lessons",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Lesson id"),
        ("delete_all_future" = Option<bool>, Query, description = "Also delete later unfinished lessons of the same series")
    ),
    responses(
        (status = 200, description = "Lessons deleted"),
        (status = 404, description = "Lesson not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn delete_lesson(
    lesson_service: web::Data<LessonService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    query: web::Query<DeleteLessonRequest>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match lesson_service
        .delete_lesson(tutor_id, path.into_inner(), query.delete_all_future)
        .await
    {
        Ok(deleted) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "deleted_count": deleted }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/lessons/refresh-statuses",
    tag = "lessons",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Statuses recomputed for the current tutor"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn refresh_statuses(
    status_service: web::Data<StatusService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    // 与后台扫描同一套谓词，只是限定在当前 tutor
    match status_service.sweep(Utc::now(), Some(tutor_id)).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "started": outcome.started,
                "completed": outcome.completed
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn lesson_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/lessons")
            // /upcoming 必须先于 /{id} 注册
            .route("/upcoming", web::get().to(upcoming_lessons))
            .route("/refresh-statuses", web::post().to(refresh_statuses))
            .route("", web::get().to(list_lessons))
            .route("", web::post().to(create_lesson))
            .route("/{id}", web::get().to(get_lesson))
            .route("/{id}", web::put().to(update_lesson))
            .route("/{id}", web::delete().to(delete_lesson))
            .route("/{id}/cancel", web::post().to(cancel_lesson))
            .route("/{id}/restore", web::post().to(restore_lesson))
            .route("/{id}/reschedule", web::post().to(reschedule_lesson)),
    );
}
