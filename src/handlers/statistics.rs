use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, ResponseError, Result};
use chrono::Utc;
use serde_json::json;
use crate::models::*;
use crate::services::StatisticsService;

fn get_user_id_from_request(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

#[utoipa::path(
    get,
    path = "/statistics",
    tag = "statistics",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("start_date" = Option<String>, Query, description = "Range start (RFC 3339), defaults to current month start"),
        ("end_date" = Option<String>, Query, description = "Range end (RFC 3339), defaults to next month start")
    ),
    responses(
        (status = 200, description = "Earnings summary", body = StatisticsResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn summary(
    statistics_service: web::Data<StatisticsService>,
    req: HttpRequest,
    query: web::Query<StatisticsQuery>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match statistics_service
        .summary(tutor_id, query.into_inner(), Utc::now())
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
    get,
    path = "/statistics/by-subject",
    tag = "statistics",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Lesson counts and totals per subject", body = [SubjectStat]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn by_subject(
    statistics_service: web::Data<StatisticsService>,
    req: HttpRequest,
    query: web::Query<StatisticsQuery>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match statistics_service
        .by_subject(tutor_id, query.into_inner(), Utc::now())
        .await
    {
        Ok(stats) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/statistics/by-type",
    tag = "statistics",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Lesson counts and totals per lesson type", body = [LessonTypeStat]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn by_lesson_type(
    statistics_service: web::Data<StatisticsService>,
    req: HttpRequest,
    query: web::Query<StatisticsQuery>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match statistics_service
        .by_lesson_type(tutor_id, query.into_inner(), Utc::now())
        .await
    {
        Ok(stats) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/statistics/by-student",
    tag = "statistics",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Lesson counts and totals per student", body = [StudentStat]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn by_student(
    statistics_service: web::Data<StatisticsService>,
    req: HttpRequest,
    query: web::Query<StatisticsQuery>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match statistics_service
        .by_student(tutor_id, query.into_inner(), Utc::now())
        .await
    {
        Ok(stats) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn statistics_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/statistics")
            .route("", web::get().to(summary))
            .route("/by-subject", web::get().to(by_subject))
            .route("/by-type", web::get().to(by_lesson_type))
            .route("/by-student", web::get().to(by_student)),
    );
}
