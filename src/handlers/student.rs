use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, ResponseError, Result};
use serde_json::json;
use uuid::Uuid;
use crate::models::*;
use crate::services::StudentService;

fn get_user_id_from_request(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "All students of the current tutor", body = [StudentResponse]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_students(
    student_service: web::Data<StudentService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match student_service.list_students(tutor_id).await {
        Ok(students) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": students
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "students",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Student id")
    ),
    responses(
        (status = 200, description = "Student with full lesson history", body = StudentDetailResponse),
        (status = 404, description = "Student not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_student(
    student_service: web::Data<StudentService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match student_service
        .get_student(tutor_id, path.into_inner())
        .await
    {
        Ok(student) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": student
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/students",
    tag = "students",
    request_body = CreateStudentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Student created", body = StudentResponse),
        (status = 400, description = "Invalid request body"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_student(
    student_service: web::Data<StudentService>,
    req: HttpRequest,
    request: web::Json<CreateStudentRequest>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match student_service
        .create_student(tutor_id, request.into_inner())
        .await
    {
        Ok(student) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": student
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/students/{id}",
    tag = "students",
    request_body = UpdateStudentRequest,
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Student id")
    ),
    responses(
        (status = 200, description = "Student updated", body = StudentResponse),
        (status = 404, description = "Student not found"),
        (status = 400, description = "Invalid request body")
    )
)]
pub async fn update_student(
    student_service: web::Data<StudentService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<UpdateStudentRequest>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match student_service
        .update_student(tutor_id, path.into_inner(), request.into_inner())
        .await
    {
        Ok(student) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": student
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/students/{id}",
    tag = "students",
    security(
        ("bearer_auth" = [])
    ),
    params(
        ("id" = Uuid, Path, description = "Student id")
    ),
    responses(
        (status = 200, description = "Student and their lessons deleted"),
        (status = 404, description = "Student not found"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn delete_student(
    student_service: web::Data<StudentService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);

    match student_service
        .delete_student(tutor_id, path.into_inner())
        .await
    {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Student deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn student_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/students")
            .route("", web::get().to(list_students))
            .route("", web::post().to(create_student))
            .route("/{id}", web::get().to(get_student))
            .route("/{id}", web::put().to(update_student))
            .route("/{id}", web::delete().to(delete_student)),
    );
}
