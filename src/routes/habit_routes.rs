//! HTTP routes for habits
//!
//! Provides REST API endpoints for habit management, all scoped to the
//! owner carried in the bearer token:
//! - POST   /habits               - Create a habit with a uniform schedule
//! - POST   /habits/ai            - Create a habit from an AI-generated plan
//! - GET    /habits/daily         - Habits scheduled on one date
//! - GET    /habits               - All habits, newest first
//! - GET    /habits/{id}          - Fetch one habit
//! - PUT    /habits/{id}          - Partial update of the habit fields
//! - DELETE /habits/{id}          - Soft-delete
//! - PATCH  /habits/{id}/day      - Rename one scheduled day
//! - PATCH  /habits/{id}/complete - Mark or unmark one scheduled day

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use chrono::SecondsFormat;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::{extract_token_from_header, JwtValidator};
use crate::db::schemas::{DayRecord, HabitDoc, HabitKind, HABIT_COLLECTION};
use crate::habits::lifecycle::HabitPatch;
use crate::habits::{dates, lifecycle, schedule};
use crate::server::AppState;
use crate::types::RitualError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHabitRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAiHabitRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    /// Optional; zero or absent lets the model pick the plan length
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHabitRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDayTitleRequest {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub day_title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkCompletionRequest {
    /// Defaults to today when absent
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

/// Habit payload returned by every habit endpoint. The owner id never
/// appears on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitSummary {
    pub id: String,
    pub title: String,
    pub start_date: String,
    pub duration: i64,
    #[serde(rename = "type")]
    pub kind: HabitKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub current_streak: i64,
    pub is_completed: bool,
    pub days: Vec<DaySummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub day_title: String,
    pub date: String,
    pub completed: bool,
}

impl HabitSummary {
    fn from_doc(habit: &HabitDoc) -> Self {
        Self {
            id: habit._id.map(|id| id.to_hex()).unwrap_or_default(),
            title: habit.title.clone(),
            start_date: habit
                .start_date
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            duration: habit.duration,
            kind: habit.kind,
            color: habit.color.clone(),
            icon: habit.icon.clone(),
            current_streak: habit.current_streak,
            is_completed: habit.is_completed,
            days: habit.days.iter().map(DaySummary::from_record).collect(),
        }
    }
}

impl DaySummary {
    fn from_record(day: &DayRecord) -> Self {
        Self {
            day_title: day.day_title.clone(),
            date: day.date.to_rfc3339_opts(SecondsFormat::Millis, true),
            completed: day.completed,
        }
    }
}

/// Single-habit success payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitResponse {
    pub message: String,
    pub habit: HabitSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_generated: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct HabitListResponse {
    pub message: String,
    pub habits: Vec<HabitSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitDeletedResponse {
    pub message: String,
    pub habit_id: String,
}

/// One habit scheduled on the requested date, with that day's record
/// pulled up next to the habit fields.
#[derive(Debug, Serialize)]
pub struct DailyHabitSummary {
    #[serde(flatten)]
    pub habit: HabitSummary,
    pub day: DaySummary,
}

#[derive(Debug, Serialize)]
pub struct DailyHabitsResponse {
    pub message: String,
    pub date: String,
    pub habits: Vec<DailyHabitSummary>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// 503 payload for AI planner failures, with the upstream detail
#[derive(Debug, Serialize)]
pub struct AiUnavailableResponse {
    pub message: String,
    pub error: String,
}

// =============================================================================
// Response Helpers
// =============================================================================

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, PATCH, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, PATCH, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<hyper::body::Incoming>,
) -> Result<T, RitualError> {
    let body = req
        .collect()
        .await
        .map_err(|e| RitualError::Validation(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 10240 {
        return Err(RitualError::Validation("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| RitualError::Validation(format!("Invalid JSON: {}", e)))
}

fn get_auth_header(req: &Request<hyper::body::Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

fn parse_query_params(query: &str) -> HashMap<String, String> {
    if query.is_empty() {
        return HashMap::new();
    }

    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

// =============================================================================
// Auth Helpers
// =============================================================================

fn get_jwt_validator(state: &AppState) -> Result<JwtValidator, Response<BoxBody>> {
    match &state.args.jwt_secret {
        Some(secret) => {
            JwtValidator::new(secret.clone(), state.args.jwt_expiry_seconds).map_err(|e| {
                error!("JWT configuration error: {}", e);
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &MessageResponse {
                        message: "Server error during authentication".into(),
                    },
                )
            })
        }
        None => Err(json_response(
            StatusCode::NOT_IMPLEMENTED,
            &MessageResponse {
                message: "Authentication not enabled (missing JWT_SECRET)".into(),
            },
        )),
    }
}

/// Resolve the bearer token to the owning user's id.
///
/// Missing header and unusable tokens are both 401, with the middleware's
/// distinct messages.
fn authenticate_request(
    req: &Request<hyper::body::Incoming>,
    state: &AppState,
) -> Result<ObjectId, Response<BoxBody>> {
    let auth_header = match get_auth_header(req) {
        Some(h) => h,
        None => {
            return Err(json_response(
                StatusCode::UNAUTHORIZED,
                &MessageResponse {
                    message: "No token provided".into(),
                },
            ))
        }
    };

    let token = match extract_token_from_header(Some(auth_header)) {
        Some(t) => t,
        None => {
            return Err(json_response(
                StatusCode::UNAUTHORIZED,
                &MessageResponse {
                    message: "Invalid token".into(),
                },
            ))
        }
    };

    let jwt = get_jwt_validator(state)?;

    let result = jwt.verify_token(token);
    let claims = match result.claims {
        Some(c) if result.valid => c,
        _ => {
            warn!("Token verification failed: {:?}", result.error);
            return Err(json_response(
                StatusCode::UNAUTHORIZED,
                &MessageResponse {
                    message: "Invalid token".into(),
                },
            ));
        }
    };

    ObjectId::parse_str(&claims.sub).map_err(|_| {
        warn!("Token subject is not a valid id: {}", claims.sub);
        json_response(
            StatusCode::UNAUTHORIZED,
            &MessageResponse {
                message: "Invalid token".into(),
            },
        )
    })
}

fn parse_object_id(id: &str) -> Result<ObjectId, Response<BoxBody>> {
    ObjectId::parse_str(id).map_err(|_| {
        json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: "Invalid habit ID".into(),
            },
        )
    })
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /habits
///
/// Create a habit with a uniform schedule: one record per day, each
/// carrying the habit title until renamed.
async fn handle_create_habit(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let owner = match authenticate_request(&req, &state) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let body: CreateHabitRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: format!("Invalid JSON body: {}", e),
                },
            )
        }
    };

    let title = body.title.unwrap_or_default();
    let start_raw = body.start_date.unwrap_or_default();
    let kind_raw = body.kind.unwrap_or_default();
    let duration = body.duration.unwrap_or(0);

    if title.trim().is_empty() || start_raw.is_empty() || duration == 0 || kind_raw.is_empty() {
        return json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: "All fields are required".into(),
            },
        );
    }

    let kind = match HabitKind::parse(&kind_raw) {
        Ok(k) => k,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: e.to_string(),
                },
            )
        }
    };

    if let Err(e) = schedule::validate_duration(duration) {
        return json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: e.to_string(),
            },
        );
    }

    let start_date = match lifecycle::parse_start_date(&start_raw) {
        Ok(d) => d,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: e.to_string(),
                },
            )
        }
    };

    if lifecycle::starts_in_past(start_date, dates::today()) {
        return json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: "Start date cannot be more than 0 days in the past".into(),
            },
        );
    }

    let days = match schedule::build_schedule(start_date, duration, &title) {
        Ok(d) => d,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: e.to_string(),
                },
            )
        }
    };

    let collection = match state.mongo.collection::<HabitDoc>(HABIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Habits collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during habit creation".into(),
                },
            );
        }
    };

    let mut habit = HabitDoc::new(
        owner,
        title.trim().to_string(),
        start_date,
        duration,
        kind,
        None,
        None,
        days,
    );

    let habit_id = match collection.insert_one(habit.clone()).await {
        Ok(id) => id,
        Err(e) => {
            error!("Habit insert error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during habit creation".into(),
                },
            );
        }
    };
    habit._id = Some(habit_id);

    info!(
        "Created habit '{}' ({} days) for {}",
        habit.title,
        habit.duration,
        owner.to_hex()
    );

    json_response(
        StatusCode::CREATED,
        &HabitResponse {
            message: "Habit created successfully".into(),
            habit: HabitSummary::from_doc(&habit),
            ai_generated: None,
        },
    )
}

/// POST /habits/ai
///
/// Create a habit whose daily tasks come from the AI planner. A missing or
/// zero duration lets the model pick the plan length.
async fn handle_create_ai_habit(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let owner = match authenticate_request(&req, &state) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let body: CreateAiHabitRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: format!("Invalid JSON body: {}", e),
                },
            )
        }
    };

    let title = body.title.unwrap_or_default();
    let start_raw = body.start_date.unwrap_or_default();
    let kind_raw = body.kind.unwrap_or_default();
    let color = body.color.unwrap_or_default();
    let icon = body.icon.unwrap_or_default();

    if title.trim().is_empty()
        || start_raw.is_empty()
        || kind_raw.is_empty()
        || color.is_empty()
        || icon.is_empty()
    {
        return json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: "Title, startDate, type, color, icon and userId are required".into(),
            },
        );
    }

    let kind = match HabitKind::parse(&kind_raw) {
        Ok(k) => k,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: e.to_string(),
                },
            )
        }
    };

    // Zero means "let the model decide", matching clients that send 0
    // instead of leaving the field out
    let requested_duration = body.duration.filter(|d| *d != 0);
    if let Some(d) = requested_duration {
        if let Err(e) = schedule::validate_duration(d) {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: e.to_string(),
                },
            );
        }
    }

    let start_date = match lifecycle::parse_start_date(&start_raw) {
        Ok(d) => d,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: e.to_string(),
                },
            )
        }
    };

    if lifecycle::starts_in_past(start_date, dates::today()) {
        return json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: "Start date cannot be in the past".into(),
            },
        );
    }

    let planner = match &state.planner {
        Some(p) => p,
        None => {
            warn!("AI habit requested but no planner is configured");
            return json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &AiUnavailableResponse {
                    message: "AI service temporarily unavailable".into(),
                    error: "AI planner is not configured".into(),
                },
            );
        }
    };

    let plan = match planner
        .generate_plan(title.trim(), kind, requested_duration)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            error!("AI plan generation failed: {}", e);
            return json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &AiUnavailableResponse {
                    message: "AI service temporarily unavailable".into(),
                    error: e.to_string(),
                },
            );
        }
    };

    let days = match schedule::build_schedule_from_titles(start_date, plan.duration, &plan.day_titles)
    {
        Ok(d) => d,
        Err(e) => {
            error!("AI schedule assembly failed: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during AI habit creation".into(),
                },
            );
        }
    };

    let collection = match state.mongo.collection::<HabitDoc>(HABIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Habits collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during AI habit creation".into(),
                },
            );
        }
    };

    let mut habit = HabitDoc::new(
        owner,
        title.trim().to_string(),
        start_date,
        plan.duration,
        kind,
        Some(color),
        Some(icon),
        days,
    );

    let habit_id = match collection.insert_one(habit.clone()).await {
        Ok(id) => id,
        Err(e) => {
            error!("Habit insert error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during AI habit creation".into(),
                },
            );
        }
    };
    habit._id = Some(habit_id);

    info!(
        "Created AI habit '{}' ({} days) for {}",
        habit.title,
        habit.duration,
        owner.to_hex()
    );

    json_response(
        StatusCode::CREATED,
        &HabitResponse {
            message: "AI-powered habit created successfully".into(),
            habit: HabitSummary::from_doc(&habit),
            ai_generated: Some(true),
        },
    )
}

/// GET /habits
///
/// All of the owner's habits, newest created first.
async fn handle_list_habits(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let owner = match authenticate_request(&req, &state) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let collection = match state.mongo.collection::<HabitDoc>(HABIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Habits collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error while retrieving habits".into(),
                },
            );
        }
    };

    let habits = match collection
        .find_many_sorted(doc! { "owner": owner }, doc! { "metadata.created_at": -1 })
        .await
    {
        Ok(h) => h,
        Err(e) => {
            error!("Habit query error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error while retrieving habits".into(),
                },
            );
        }
    };

    json_response(
        StatusCode::OK,
        &HabitListResponse {
            message: "Habits retrieved successfully".into(),
            habits: habits.iter().map(HabitSummary::from_doc).collect(),
        },
    )
}

/// GET /habits/daily?date=
///
/// Habits whose schedule covers the given date (default today) and that
/// are still in progress, each with that day's record pulled out.
async fn handle_habits_for_date(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let owner = match authenticate_request(&req, &state) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let date_param = req
        .uri()
        .query()
        .and_then(|q| parse_query_params(q).remove("date"));

    let date = match date_param {
        Some(raw) => match dates::parse_day(&raw) {
            Ok(d) => d,
            Err(_) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &MessageResponse {
                        message: "Invalid date format".into(),
                    },
                )
            }
        },
        None => dates::today(),
    };

    let collection = match state.mongo.collection::<HabitDoc>(HABIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Habits collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error while retrieving habits".into(),
                },
            );
        }
    };

    // The start bound runs in the database; the end bound depends on the
    // duration, so it is applied here
    let filter = doc! {
        "owner": owner,
        "is_completed": false,
        "start_date": { "$lte": bson::DateTime::from_chrono(date) },
    };

    let habits = match collection
        .find_many_sorted(filter, doc! { "start_date": 1 })
        .await
    {
        Ok(h) => h,
        Err(e) => {
            error!("Habit query error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error while retrieving habits".into(),
                },
            );
        }
    };

    let mut daily = Vec::new();
    for habit in &habits {
        if date > schedule::end_date(habit.start_date, habit.duration) {
            continue;
        }
        if let Some(day) = habit
            .days
            .iter()
            .find(|d| dates::normalize(d.date) == date)
        {
            daily.push(DailyHabitSummary {
                habit: HabitSummary::from_doc(habit),
                day: DaySummary::from_record(day),
            });
        }
    }

    json_response(
        StatusCode::OK,
        &DailyHabitsResponse {
            message: "Habits retrieved successfully".into(),
            date: date.to_rfc3339_opts(SecondsFormat::Millis, true),
            habits: daily,
        },
    )
}

/// GET /habits/{id}
async fn handle_get_habit(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let owner = match authenticate_request(&req, &state) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let habit_id = match parse_object_id(id) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    let collection = match state.mongo.collection::<HabitDoc>(HABIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Habits collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error while retrieving habit".into(),
                },
            );
        }
    };

    let habit = match collection
        .find_one(doc! { "_id": habit_id, "owner": owner })
        .await
    {
        Ok(Some(h)) => h,
        Ok(None) => {
            return json_response(
                StatusCode::NOT_FOUND,
                &MessageResponse {
                    message: "Habit not found".into(),
                },
            )
        }
        Err(e) => {
            error!("Habit lookup error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error while retrieving habit".into(),
                },
            );
        }
    };

    json_response(
        StatusCode::OK,
        &HabitResponse {
            message: "Habit retrieved successfully".into(),
            habit: HabitSummary::from_doc(&habit),
            ai_generated: None,
        },
    )
}

/// PUT /habits/{id}
///
/// Partial update of title, start date, duration, and kind. The existing
/// schedule is left untouched.
async fn handle_update_habit(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let owner = match authenticate_request(&req, &state) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let habit_id = match parse_object_id(id) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    let body: UpdateHabitRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: format!("Invalid JSON body: {}", e),
                },
            )
        }
    };

    // Validate every provided field before touching the document
    let kind = match body.kind.filter(|k| !k.is_empty()) {
        Some(raw) => match HabitKind::parse(&raw) {
            Ok(k) => Some(k),
            Err(e) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &MessageResponse {
                        message: e.to_string(),
                    },
                )
            }
        },
        None => None,
    };

    if let Some(d) = body.duration {
        if let Err(e) = schedule::validate_duration(d) {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: e.to_string(),
                },
            );
        }
    }

    let start_date = match body.start_date.filter(|s| !s.is_empty()) {
        Some(raw) => match lifecycle::parse_start_date(&raw) {
            Ok(d) => Some(d),
            Err(e) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &MessageResponse {
                        message: e.to_string(),
                    },
                )
            }
        },
        None => None,
    };

    let collection = match state.mongo.collection::<HabitDoc>(HABIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Habits collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during habit update".into(),
                },
            );
        }
    };

    let mut habit = match collection
        .find_one(doc! { "_id": habit_id, "owner": owner })
        .await
    {
        Ok(Some(h)) => h,
        Ok(None) => {
            return json_response(
                StatusCode::NOT_FOUND,
                &MessageResponse {
                    message: "Habit not found".into(),
                },
            )
        }
        Err(e) => {
            error!("Habit lookup error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during habit update".into(),
                },
            );
        }
    };

    lifecycle::apply_patch(
        &mut habit,
        HabitPatch {
            title: body
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            start_date,
            duration: body.duration,
            kind,
        },
    );

    let update = doc! {
        "$set": {
            "title": &habit.title,
            "start_date": bson::DateTime::from_chrono(habit.start_date),
            "duration": habit.duration,
            "kind": habit.kind.to_string(),
        }
    };

    if let Err(e) = collection
        .update_one(doc! { "_id": habit_id, "owner": owner }, update)
        .await
    {
        error!("Habit update error: {}", e);
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &MessageResponse {
                message: "Server error during habit update".into(),
            },
        );
    }

    json_response(
        StatusCode::OK,
        &HabitResponse {
            message: "Habit updated successfully".into(),
            habit: HabitSummary::from_doc(&habit),
            ai_generated: None,
        },
    )
}

/// DELETE /habits/{id}
async fn handle_delete_habit(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let owner = match authenticate_request(&req, &state) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let habit_id = match parse_object_id(id) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    let collection = match state.mongo.collection::<HabitDoc>(HABIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Habits collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during habit deletion".into(),
                },
            );
        }
    };

    // The is_deleted guard makes a repeated delete read as missing
    let result = match collection
        .soft_delete(doc! {
            "_id": habit_id,
            "owner": owner,
            "metadata.is_deleted": { "$ne": true },
        })
        .await
    {
        Ok(r) => r,
        Err(e) => {
            error!("Habit delete error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during habit deletion".into(),
                },
            );
        }
    };

    if result.matched_count == 0 {
        return json_response(
            StatusCode::NOT_FOUND,
            &MessageResponse {
                message: "Habit not found".into(),
            },
        );
    }

    info!("Deleted habit {} for {}", id, owner.to_hex());

    json_response(
        StatusCode::OK,
        &HabitDeletedResponse {
            message: "Habit deleted successfully".into(),
            habit_id: id.to_string(),
        },
    )
}

/// PATCH /habits/{id}/day
///
/// Rename one scheduled day's task.
async fn handle_update_day_title(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let owner = match authenticate_request(&req, &state) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let habit_id = match parse_object_id(id) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    let body: UpdateDayTitleRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: format!("Invalid JSON body: {}", e),
                },
            )
        }
    };

    let date_raw = body.date.unwrap_or_default();
    let day_title = body.day_title.unwrap_or_default();

    if date_raw.is_empty() || day_title.trim().is_empty() {
        return json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: "Date and dayTitle are required".into(),
            },
        );
    }

    let target = match dates::parse_day(&date_raw) {
        Ok(d) => d,
        Err(_) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: "Invalid date format".into(),
                },
            )
        }
    };

    let collection = match state.mongo.collection::<HabitDoc>(HABIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Habits collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during day title update".into(),
                },
            );
        }
    };

    let mut habit = match collection
        .find_one(doc! { "_id": habit_id, "owner": owner })
        .await
    {
        Ok(Some(h)) => h,
        Ok(None) => {
            return json_response(
                StatusCode::NOT_FOUND,
                &MessageResponse {
                    message: "Habit not found".into(),
                },
            )
        }
        Err(e) => {
            error!("Habit lookup error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during day title update".into(),
                },
            );
        }
    };

    if let Err(e) = lifecycle::rename_day(&mut habit, target, &day_title) {
        return json_response(
            e.status_code(),
            &MessageResponse {
                message: e.to_string(),
            },
        );
    }

    let days = match bson::to_bson(&habit.days) {
        Ok(d) => d,
        Err(e) => {
            error!("Day serialization error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during day title update".into(),
                },
            );
        }
    };

    if let Err(e) = collection
        .update_one(
            doc! { "_id": habit_id, "owner": owner },
            doc! { "$set": { "days": days } },
        )
        .await
    {
        error!("Habit update error: {}", e);
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &MessageResponse {
                message: "Server error during day title update".into(),
            },
        );
    }

    json_response(
        StatusCode::OK,
        &HabitResponse {
            message: "Day title updated successfully".into(),
            habit: HabitSummary::from_doc(&habit),
            ai_generated: None,
        },
    )
}

/// PATCH /habits/{id}/complete
///
/// Mark or unmark one scheduled day, then refresh the streak and the
/// completion flag.
async fn handle_mark_completion(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    id: &str,
) -> Response<BoxBody> {
    let owner = match authenticate_request(&req, &state) {
        Ok(o) => o,
        Err(resp) => return resp,
    };

    let habit_id = match parse_object_id(id) {
        Ok(i) => i,
        Err(resp) => return resp,
    };

    let body: MarkCompletionRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: format!("Invalid JSON body: {}", e),
                },
            )
        }
    };

    let completed = match body.completed {
        Some(c) => c,
        None => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: "Completed status is required".into(),
                },
            )
        }
    };

    let target = match body.date.filter(|d| !d.is_empty()) {
        Some(raw) => match dates::parse_day(&raw) {
            Ok(d) => d,
            Err(_) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &MessageResponse {
                        message: "Invalid date format".into(),
                    },
                )
            }
        },
        None => dates::today(),
    };

    let collection = match state.mongo.collection::<HabitDoc>(HABIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Habits collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error while marking habit completion".into(),
                },
            );
        }
    };

    let mut habit = match collection
        .find_one(doc! { "_id": habit_id, "owner": owner })
        .await
    {
        Ok(Some(h)) => h,
        Ok(None) => {
            return json_response(
                StatusCode::NOT_FOUND,
                &MessageResponse {
                    message: "Habit not found".into(),
                },
            )
        }
        Err(e) => {
            error!("Habit lookup error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error while marking habit completion".into(),
                },
            );
        }
    };

    if let Err(e) = lifecycle::record_completion(&mut habit, target, completed, dates::today()) {
        return json_response(
            e.status_code(),
            &MessageResponse {
                message: e.to_string(),
            },
        );
    }

    let days = match bson::to_bson(&habit.days) {
        Ok(d) => d,
        Err(e) => {
            error!("Day serialization error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error while marking habit completion".into(),
                },
            );
        }
    };

    let update = doc! {
        "$set": {
            "days": days,
            "current_streak": habit.current_streak,
            "is_completed": habit.is_completed,
        }
    };

    if let Err(e) = collection
        .update_one(doc! { "_id": habit_id, "owner": owner }, update)
        .await
    {
        error!("Habit update error: {}", e);
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &MessageResponse {
                message: "Server error while marking habit completion".into(),
            },
        );
    }

    json_response(
        StatusCode::OK,
        &HabitResponse {
            message: "Habit completion marked successfully".into(),
            habit: HabitSummary::from_doc(&habit),
            ai_generated: None,
        },
    )
}

// =============================================================================
// Main Router
// =============================================================================

/// Handle habit-related HTTP requests.
///
/// Returns Some(response) if the request was handled, None if not a habit route.
pub async fn handle_habit_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    // Only handle /habits* routes
    if !path.starts_with("/habits") {
        return None;
    }

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    // Remove query string, then keep the part after /habits
    let path = path.split('?').next().unwrap_or(&path).to_string();
    let subpath = path.strip_prefix("/habits").unwrap_or("");

    let response = match (method, subpath) {
        (Method::POST, "") | (Method::POST, "/") => handle_create_habit(req, state).await,
        (Method::POST, "/ai") => handle_create_ai_habit(req, state).await,
        (Method::GET, "/daily") => handle_habits_for_date(req, state).await,
        (Method::GET, "") | (Method::GET, "/") => handle_list_habits(req, state).await,

        // GET /habits/{id}
        (Method::GET, p) if p.matches('/').count() == 1 => {
            let id = p.trim_start_matches('/');
            handle_get_habit(req, state, id).await
        }

        // PUT /habits/{id}
        (Method::PUT, p) if p.matches('/').count() == 1 => {
            let id = p.trim_start_matches('/');
            handle_update_habit(req, state, id).await
        }

        // DELETE /habits/{id}
        (Method::DELETE, p) if p.matches('/').count() == 1 => {
            let id = p.trim_start_matches('/');
            handle_delete_habit(req, state, id).await
        }

        // PATCH /habits/{id}/day
        (Method::PATCH, p) if p.ends_with("/day") => {
            let id = p
                .strip_prefix('/')
                .and_then(|s| s.strip_suffix("/day"))
                .unwrap_or("");
            handle_update_day_title(req, state, id).await
        }

        // PATCH /habits/{id}/complete
        (Method::PATCH, p) if p.ends_with("/complete") => {
            let id = p
                .strip_prefix('/')
                .and_then(|s| s.strip_suffix("/complete"))
                .unwrap_or("");
            handle_mark_completion(req, state, id).await
        }

        // Habit endpoint not found
        _ => json_response(
            StatusCode::NOT_FOUND,
            &MessageResponse {
                message: "Habit endpoint not found".into(),
            },
        ),
    };

    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habits::schedule::build_schedule;
    use chrono::TimeZone;

    fn sample_habit() -> HabitDoc {
        let start = chrono::Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let days = build_schedule(start, 3, "Meditate").unwrap();
        let mut habit = HabitDoc::new(
            ObjectId::new(),
            "Meditate".to_string(),
            start,
            3,
            HabitKind::Build,
            None,
            None,
            days,
        );
        habit._id = Some(ObjectId::new());
        habit
    }

    #[test]
    fn test_habit_summary_uses_wire_names() {
        let habit = sample_habit();
        let json = serde_json::to_value(HabitSummary::from_doc(&habit)).unwrap();

        assert_eq!(json["title"], "Meditate");
        assert_eq!(json["type"], "build");
        assert_eq!(json["startDate"], "2025-03-01T00:00:00.000Z");
        assert_eq!(json["duration"], 3);
        assert_eq!(json["currentStreak"], 0);
        assert_eq!(json["isCompleted"], false);
        assert_eq!(json["days"].as_array().unwrap().len(), 3);
        assert_eq!(json["days"][1]["dayTitle"], "Meditate");
        assert_eq!(json["days"][1]["date"], "2025-03-02T00:00:00.000Z");
        assert!(json.get("owner").is_none());
        assert!(json.get("color").is_none());
    }

    #[test]
    fn test_habit_response_skips_ai_flag_for_manual_habits() {
        let habit = sample_habit();
        let json = serde_json::to_value(HabitResponse {
            message: "Habit created successfully".into(),
            habit: HabitSummary::from_doc(&habit),
            ai_generated: None,
        })
        .unwrap();

        assert!(json.get("aiGenerated").is_none());
    }

    #[test]
    fn test_daily_summary_flattens_habit_fields() {
        let habit = sample_habit();
        let day = DaySummary::from_record(&habit.days[0]);
        let json = serde_json::to_value(DailyHabitSummary {
            habit: HabitSummary::from_doc(&habit),
            day,
        })
        .unwrap();

        assert_eq!(json["title"], "Meditate");
        assert_eq!(json["day"]["date"], "2025-03-01T00:00:00.000Z");
        assert_eq!(json["day"]["completed"], false);
    }

    #[test]
    fn test_parse_object_id_rejects_bad_hex() {
        assert!(parse_object_id("not-an-object-id").is_err());
        assert!(parse_object_id("65f2a1b3c4d5e6f708192a3b").is_ok());
    }

    #[test]
    fn test_parse_query_params_extracts_date() {
        let params = parse_query_params("date=2025-03-01&extra=1");
        assert_eq!(params.get("date"), Some(&"2025-03-01".to_string()));
    }

    #[test]
    fn test_create_request_maps_type_to_kind() {
        let body: CreateHabitRequest = serde_json::from_str(
            r#"{"title":"Read","startDate":"2025-03-01","duration":21,"type":"quit"}"#,
        )
        .unwrap();
        assert_eq!(body.kind.as_deref(), Some("quit"));
        assert_eq!(body.duration, Some(21));
    }

    #[test]
    fn test_completion_request_tolerates_missing_date() {
        let body: MarkCompletionRequest = serde_json::from_str(r#"{"completed":true}"#).unwrap();
        assert!(body.date.is_none());
        assert_eq!(body.completed, Some(true));
    }
}
