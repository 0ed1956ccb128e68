use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Result};
use futures_util::stream;
use tokio::sync::broadcast;
use crate::external::{StatusChangeEvent, StatusNotifier};

fn get_user_id_from_request(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

fn sse_frame(event: &StatusChangeEvent) -> Option<web::Bytes> {
    match serde_json::to_string(event) {
        Ok(payload) => Some(web::Bytes::from(format!("data: {payload}\n\n"))),
        Err(e) => {
            log::error!("Failed to serialize status event: {e}");
            None
        }
    }
}

/// Server-sent events stream of the current tutor's lesson status changes.
/// Browsers cannot set headers on EventSource, so the auth middleware also
/// accepts the token as a `?token=` query parameter on this route.
#[utoipa::path(
    get,
    path = "/events/lessons",
    tag = "events",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "text/event-stream of StatusChangeEvent frames"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn lesson_events(
    notifier: web::Data<StatusNotifier>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let tutor_id = get_user_id_from_request(&req).unwrap_or(0);
    let rx = notifier.subscribe();

    let events = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    // 只推送当前 tutor 自己的课程事件
                    if event.tutor_id != tutor_id {
                        continue;
                    }
                    if let Some(frame) = sse_frame(&event) {
                        return Some((Ok::<_, actix_web::Error>(frame), rx));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("SSE subscriber for tutor {tutor_id} lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(events))
}

pub fn events_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/events").route("/lessons", web::get().to(lesson_events)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::LessonStatus;
    use uuid::Uuid;

    #[test]
    fn test_sse_frame_format() {
        let event = StatusChangeEvent {
            event_type: "lesson_status_updated".to_string(),
            lesson_id: Uuid::nil(),
            status: LessonStatus::InProgress,
            tutor_id: 1,
        };
        let frame = sse_frame(&event).unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("\n\n"));
        assert!(text.contains("\"IN_PROGRESS\""));
    }
}
