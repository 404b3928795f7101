use crate::config::Settings;
use crate::handlers;
use actix_web::{web, HttpResponse, Scope};
use serde_json::json;

/// Feature routers mounted under the versioned prefix, as
/// (path prefix, tag) pairs. Pure composition; the handlers own behavior.
pub const FEATURE_ROUTERS: &[(&str, &str)] = &[
    ("/auth", "authentication"),
    ("/medical-records", "medical-records"),
    ("/appointments", "appointments"),
    ("/messages", "messages"),
];

/// Composes the version-1 routing table under `prefix`.
pub fn api_router(prefix: &str) -> Scope {
    web::scope(prefix)
        .route("/openapi.json", web::get().to(serve_openapi))
        .service(auth_router())
        .service(medical_records_router())
        .service(appointments_router())
        .service(messages_router())
}

fn auth_router() -> Scope {
    web::scope("/auth")
        .route("/register", web::post().to(handlers::register))
        .route("/login", web::post().to(handlers::login))
        .route("/refresh", web::post().to(handlers::refresh))
}

fn medical_records_router() -> Scope {
    web::scope("/medical-records")
        .route("", web::get().to(handlers::list_medical_records))
        .route("", web::post().to(handlers::create_medical_record))
}

fn appointments_router() -> Scope {
    web::scope("/appointments")
        .route("", web::get().to(handlers::list_appointments))
        .route("", web::post().to(handlers::create_appointment))
}

fn messages_router() -> Scope {
    web::scope("/messages")
        .route("", web::get().to(handlers::list_messages))
        .route("", web::post().to(handlers::send_message))
}

/// Machine-readable schema served at `{api_v1_prefix}/openapi.json`.
#[derive(Clone)]
pub struct OpenApiDocument(pub serde_json::Value);

pub fn openapi_document(settings: &Settings) -> OpenApiDocument {
    let prefix = &settings.project.api_v1_prefix;
    OpenApiDocument(json!({
        "openapi": "3.0.3",
        "info": {
            "title": settings.project.name,
            "description": "Telemedicine platform for patient-doctor consultations",
            "version": "1.0.0",
        },
        "tags": FEATURE_ROUTERS
            .iter()
            .map(|(_, tag)| json!({ "name": tag }))
            .collect::<Vec<_>>(),
        "paths": {
            "/health": {
                "get": {
                    "summary": "Liveness probe",
                    "responses": { "200": { "description": "Service is up" } }
                }
            },
            (format!("{prefix}/auth/register")): { "post": { "tags": ["authentication"] } },
            (format!("{prefix}/auth/login")): { "post": { "tags": ["authentication"] } },
            (format!("{prefix}/auth/refresh")): { "post": { "tags": ["authentication"] } },
            (format!("{prefix}/medical-records")): {
                "get": { "tags": ["medical-records"] },
                "post": { "tags": ["medical-records"] }
            },
            (format!("{prefix}/appointments")): {
                "get": { "tags": ["appointments"] },
                "post": { "tags": ["appointments"] }
            },
            (format!("{prefix}/messages")): {
                "get": { "tags": ["messages"] },
                "post": { "tags": ["messages"] }
            },
        },
    }))
}

async fn serve_openapi(doc: web::Data<OpenApiDocument>) -> HttpResponse {
    HttpResponse::Ok().json(&doc.0)
}
