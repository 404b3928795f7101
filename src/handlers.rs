use crate::auth::{extract_bearer_token, JwtAuth};
use crate::database::with_unit_of_work;
use crate::error::ApiError;
use crate::models::*;
use actix_web::{web, HttpRequest, HttpResponse};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use validator::Validate;

pub struct AppState {
    pub pool: PgPool,
    pub jwt_auth: Arc<JwtAuth>,
}

// ============ Health Check ============

/// Liveness probe. Deliberately checks nothing: it reports that the process
/// is up, not that its dependencies are.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "telemedicine-backend"
    }))
}

// ============ Shared auth plumbing ============

fn authenticated_claims(req: &HttpRequest, state: &AppState) -> Result<Claims, ApiError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());
    let token = extract_bearer_token(header).map_err(|_| ApiError::Unauthorized)?;
    let claims = state
        .jwt_auth
        .validate_token(token)
        .map_err(|_| ApiError::Unauthorized)?;
    if claims.kind != TokenKind::Access {
        return Err(ApiError::Unauthorized);
    }
    Ok(claims)
}

fn validated<T: Validate>(body: &T) -> Result<(), ApiError> {
    body.validate().map_err(|e| ApiError::Validation(e.to_string()))
}

// ============ Authentication Handlers ============

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    validated(&*body)?;

    let role = body.role.as_str();
    if role != "patient" && role != "doctor" {
        return Err(ApiError::Validation(
            "role must be 'patient' or 'doctor'".to_string(),
        ));
    }

    let email = body.email.trim().to_lowercase();
    let full_name = body.full_name.trim().to_string();
    let role = role.to_string();

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(body.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user = with_unit_of_work::<User, ApiError, _>(&state.pool, move |conn| {
        Box::pin(async move {
            let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
                .bind(&email)
                .fetch_optional(&mut *conn)
                .await?;
            if existing.is_some() {
                return Err(ApiError::Conflict("user already exists".to_string()));
            }

            let user: User = sqlx::query_as(
                "INSERT INTO users (email, password_hash, full_name, role)
                 VALUES ($1, $2, $3, $4) RETURNING *",
            )
            .bind(&email)
            .bind(&password_hash)
            .bind(&full_name)
            .bind(&role)
            .fetch_one(&mut *conn)
            .await?;
            Ok(user)
        })
    })
    .await?;

    let access_token = state.jwt_auth.generate_access_token(&user)?;
    let refresh_token = state.jwt_auth.generate_refresh_token(&user)?;

    Ok(HttpResponse::Created().json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    validated(&*body)?;

    let email = body.email.trim().to_lowercase();

    let user: User =
        sqlx::query_as("SELECT * FROM users WHERE email = $1 AND is_active = true")
            .bind(&email)
            .fetch_optional(&state.pool)
            .await?
            .ok_or(ApiError::Unauthorized)?;

    let parsed_hash =
        PasswordHash::new(&user.password_hash).map_err(|_| ApiError::Unauthorized)?;
    Argon2::default()
        .verify_password(body.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let access_token = state.jwt_auth.generate_access_token(&user)?;
    let refresh_token = state.jwt_auth.generate_refresh_token(&user)?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

pub async fn refresh(
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> Result<HttpResponse, ApiError> {
    let claims = state
        .jwt_auth
        .validate_token(&body.refresh_token)
        .map_err(|_| ApiError::Unauthorized)?;
    if claims.kind != TokenKind::Refresh {
        return Err(ApiError::Unauthorized);
    }

    let user: User =
        sqlx::query_as("SELECT * FROM users WHERE id = $1 AND is_active = true")
            .bind(claims.user_id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or(ApiError::Unauthorized)?;

    let access_token = state.jwt_auth.generate_access_token(&user)?;
    let refresh_token = state.jwt_auth.generate_refresh_token(&user)?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

// ============ Medical Record Handlers ============

pub async fn list_medical_records(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticated_claims(&req, &state)?;

    let column = if claims.role == "doctor" {
        "doctor_id"
    } else {
        "patient_id"
    };
    let records: Vec<MedicalRecord> = sqlx::query_as(&format!(
        "SELECT * FROM medical_records WHERE {column} = $1 ORDER BY created_at DESC"
    ))
    .bind(claims.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(HttpResponse::Ok().json(records))
}

pub async fn create_medical_record(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateMedicalRecordRequest>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticated_claims(&req, &state)?;
    if claims.role != "doctor" {
        return Err(ApiError::Forbidden);
    }
    validated(&*body)?;

    let doctor_id = claims.user_id;
    let body = body.into_inner();

    let record = with_unit_of_work::<MedicalRecord, ApiError, _>(&state.pool, move |conn| {
        Box::pin(async move {
            let patient: Option<User> =
                sqlx::query_as("SELECT * FROM users WHERE id = $1 AND role = 'patient'")
                    .bind(body.patient_id)
                    .fetch_optional(&mut *conn)
                    .await?;
            if patient.is_none() {
                return Err(ApiError::NotFound("patient"));
            }

            let record: MedicalRecord = sqlx::query_as(
                "INSERT INTO medical_records (patient_id, doctor_id, title, notes)
                 VALUES ($1, $2, $3, $4) RETURNING *",
            )
            .bind(body.patient_id)
            .bind(doctor_id)
            .bind(&body.title)
            .bind(&body.notes)
            .fetch_one(&mut *conn)
            .await?;
            Ok(record)
        })
    })
    .await?;

    Ok(HttpResponse::Created().json(record))
}

// ============ Appointment Handlers ============

pub async fn list_appointments(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticated_claims(&req, &state)?;

    let column = if claims.role == "doctor" {
        "doctor_id"
    } else {
        "patient_id"
    };
    let appointments: Vec<Appointment> = sqlx::query_as(&format!(
        "SELECT * FROM appointments WHERE {column} = $1 ORDER BY scheduled_at"
    ))
    .bind(claims.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(HttpResponse::Ok().json(appointments))
}

pub async fn create_appointment(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateAppointmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticated_claims(&req, &state)?;
    if claims.role != "patient" {
        return Err(ApiError::Forbidden);
    }
    validated(&*body)?;

    let patient_id = claims.user_id;
    let body = body.into_inner();

    let appointment = with_unit_of_work::<Appointment, ApiError, _>(&state.pool, move |conn| {
        Box::pin(async move {
            let doctor: Option<User> =
                sqlx::query_as("SELECT * FROM users WHERE id = $1 AND role = 'doctor' AND is_active = true")
                    .bind(body.doctor_id)
                    .fetch_optional(&mut *conn)
                    .await?;
            if doctor.is_none() {
                return Err(ApiError::NotFound("doctor"));
            }

            let appointment: Appointment = sqlx::query_as(
                "INSERT INTO appointments (patient_id, doctor_id, scheduled_at, status, reason)
                 VALUES ($1, $2, $3, 'scheduled', $4) RETURNING *",
            )
            .bind(patient_id)
            .bind(body.doctor_id)
            .bind(body.scheduled_at)
            .bind(&body.reason)
            .fetch_one(&mut *conn)
            .await?;
            Ok(appointment)
        })
    })
    .await?;

    Ok(HttpResponse::Created().json(appointment))
}

// ============ Message Handlers ============

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub peer: uuid::Uuid,
}

pub async fn list_messages(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ConversationQuery>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticated_claims(&req, &state)?;

    let messages: Vec<Message> = sqlx::query_as(
        "SELECT * FROM messages
         WHERE (sender_id = $1 AND recipient_id = $2)
            OR (sender_id = $2 AND recipient_id = $1)
         ORDER BY sent_at",
    )
    .bind(claims.user_id)
    .bind(query.peer)
    .fetch_all(&state.pool)
    .await?;

    Ok(HttpResponse::Ok().json(messages))
}

pub async fn send_message(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticated_claims(&req, &state)?;
    validated(&*body)?;

    let sender_id = claims.user_id;
    let body = body.into_inner();

    let message = with_unit_of_work::<Message, ApiError, _>(&state.pool, move |conn| {
        Box::pin(async move {
            let recipient: Option<User> =
                sqlx::query_as("SELECT * FROM users WHERE id = $1 AND is_active = true")
                    .bind(body.recipient_id)
                    .fetch_optional(&mut *conn)
                    .await?;
            if recipient.is_none() {
                return Err(ApiError::NotFound("recipient"));
            }

            let message: Message = sqlx::query_as(
                "INSERT INTO messages (sender_id, recipient_id, body)
                 VALUES ($1, $2, $3) RETURNING *",
            )
            .bind(sender_id)
            .bind(body.recipient_id)
            .bind(&body.body)
            .fetch_one(&mut *conn)
            .await?;
            Ok(message)
        })
    })
    .await?;

    Ok(HttpResponse::Created().json(message))
}
