use crate::errors::GatewayError;
use crate::metrics;
use crate::models::{
    ApiResponse, AppTipRequest, AuthUser, CategoryGroup, CreatePostRequest, ReviewRequest,
    TipRequest, UploadRequest,
};
use crate::services::ForumService;
use actix_web::{web, HttpResponse};
use chrono::Local;
use economy_core::{taxonomy, AppSubmission, EntityRef, TaskId};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

type Service = web::Data<Arc<ForumService>>;

/// Health check endpoint
pub async fn health_check(service: Service) -> HttpResponse {
    let database = match service.store().ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    HttpResponse::Ok().json(json!({
        "status": if database == "up" { "healthy" } else { "degraded" },
        "service": "forum-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database
    }))
}

/// Tip a post
pub async fn tip_post(
    service: Service,
    user: AuthUser,
    post_id: web::Path<i64>,
    request: web::Json<TipRequest>,
) -> Result<HttpResponse, GatewayError> {
    let receipt = service
        .tip(&user, EntityRef::post(post_id.into_inner()), request.amount)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Coins sent", receipt)))
}

/// Tip a comment
pub async fn tip_comment(
    service: Service,
    user: AuthUser,
    comment_id: web::Path<i64>,
    request: web::Json<TipRequest>,
) -> Result<HttpResponse, GatewayError> {
    let receipt = service
        .tip(&user, EntityRef::comment(comment_id.into_inner()), request.amount)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Coins sent", receipt)))
}

/// Tip an app
pub async fn tip_app(
    service: Service,
    user: AuthUser,
    package_name: web::Path<String>,
    request: web::Json<AppTipRequest>,
) -> Result<HttpResponse, GatewayError> {
    let receipt = service
        .tip_app(&user, &package_name, request.coins)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Coins sent", receipt)))
}

/// Claim the daily reward for the server's local date
pub async fn check_in(service: Service, user: AuthUser) -> Result<HttpResponse, GatewayError> {
    let today = Local::now().date_naive();
    let receipt = service.check_in(&user, today).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Checked in", receipt)))
}

/// Publish a post
pub async fn create_post(
    service: Service,
    user: AuthUser,
    request: web::Json<CreatePostRequest>,
) -> Result<HttpResponse, GatewayError> {
    request.validate()?;
    let created = service.create_post(&user, &request).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok("Post published", created)))
}

/// Level progress of the caller
pub async fn my_level(service: Service, user: AuthUser) -> Result<HttpResponse, GatewayError> {
    let progress = service.level_progress(&user).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("OK", progress)))
}

/// Queue an app upload for review
pub async fn submit_upload(
    service: Service,
    user: AuthUser,
    request: web::Json<UploadRequest>,
) -> Result<HttpResponse, GatewayError> {
    let request = request.into_inner();
    request.validate()?;

    let receipt = service
        .submit_upload(&user, AppSubmission::from(request))
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Upload submitted for review", receipt)))
}

/// Approve or reject an upload
pub async fn review_upload(
    service: Service,
    user: AuthUser,
    request: web::Json<ReviewRequest>,
) -> Result<HttpResponse, GatewayError> {
    let decision = request.decision()?;
    let outcome = service
        .review_upload(&user, TaskId(request.task_id), decision)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok("Review recorded", outcome)))
}

/// Category table
pub async fn categories() -> HttpResponse {
    let groups: Vec<CategoryGroup> = taxonomy::CATEGORIES
        .iter()
        .map(|(main, subs)| CategoryGroup {
            main: main.to_string(),
            subs: subs.iter().map(|s| s.to_string()).collect(),
        })
        .collect();

    HttpResponse::Ok().json(ApiResponse::ok("OK", groups))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError()
            .json(json!({
                "error": "Failed to gather metrics",
                "details": e.to_string()
            }))
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/posts", web::post().to(create_post))
            .route("/posts/{id}/coins", web::post().to(tip_post))
            .route("/comments/{id}/coins", web::post().to(tip_comment))
            .route("/check-ins", web::post().to(check_in))
            .route("/users/me/level", web::get().to(my_level))
            .route("/apps/categories", web::get().to(categories))
            .route("/apps/uploads", web::post().to(submit_upload))
            .route("/apps/review", web::post().to(review_upload))
            .route("/apps/{package_name}/coins", web::post().to(tip_app)),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{body::to_bytes, http::StatusCode, test, App};

    #[actix_web::test]
    async fn test_categories_route() {
        let app = test::init_service(
            App::new().route("/api/v1/apps/categories", web::get().to(categories)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/apps/categories")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["code"], 200);
        assert_eq!(body["data"].as_array().unwrap().len(), 19);
        assert_eq!(body["data"][3]["main"], "Tools");
    }

    #[actix_web::test]
    async fn test_metrics_endpoint() {
        let response = metrics_endpoint().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(to_bytes(response.into_body()).await.is_ok());
    }
}
