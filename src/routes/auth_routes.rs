//! HTTP routes for authentication
//!
//! Provides REST API endpoints for account management:
//! - POST /auth/register     - Create an account and get a JWT token
//! - POST /auth/login        - Authenticate and get a JWT token
//! - GET  /auth/verify-token - Check a bearer token and return its user

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use chrono::SecondsFormat;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::{
    extract_token_from_header, hash_password, verify_password, JwtValidator, TokenInput,
};
use crate::db::schemas::{Gender, UserDoc, USER_COLLECTION};
use crate::habits::dates;
use crate::server::AppState;
use crate::types::RitualError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

const MIN_PASSWORD_LENGTH: usize = 8;

// =============================================================================
// Request/Response Types
// =============================================================================

/// All fields optional so missing keys surface as a field check, not a
/// deserialization failure.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    /// Birth date, RFC 3339 or YYYY-MM-DD
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// User payload returned by auth endpoints. Built from `UserDoc` minus the
/// password hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub birthday: String,
    pub gender: Gender,
    pub email: String,
}

impl UserResponse {
    fn from_doc(user: &UserDoc) -> Self {
        Self {
            id: user._id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            surname: user.surname.clone(),
            birthday: user.birthday.to_rfc3339_opts(SecondsFormat::Millis, true),
            gender: user.gender,
            email: user.email.clone(),
        }
    }
}

/// Success payload for register, login, and verify. The token is absent on
/// verify responses.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user: UserResponse,
}

/// Status payload; `errors` carries field-level validation detail
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
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
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
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

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /auth/register
///
/// Create an account and return a signed JWT.
///
/// Flow:
/// 1. Validate required fields and password length
/// 2. Parse gender and birthday, reporting both together
/// 3. Reject duplicate emails
/// 4. Hash the password with argon2 and store the user
/// 5. Generate and return a JWT token
async fn handle_register(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: RegisterRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: format!("Invalid JSON body: {}", e),
                    errors: None,
                },
            )
        }
    };

    let name = body.name.unwrap_or_default();
    let surname = body.surname.unwrap_or_default();
    let birthday_raw = body.birthday.unwrap_or_default();
    let gender_raw = body.gender.unwrap_or_default();
    let email = body.email.unwrap_or_default();
    let password = body.password.unwrap_or_default();

    if name.trim().is_empty()
        || surname.trim().is_empty()
        || birthday_raw.is_empty()
        || gender_raw.is_empty()
        || email.trim().is_empty()
        || password.is_empty()
    {
        return json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: "All fields are required".into(),
                errors: None,
            },
        );
    }

    if password.len() < MIN_PASSWORD_LENGTH {
        return json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: "Password must be at least 8 characters long".into(),
                errors: None,
            },
        );
    }

    let (gender, birthday) = match (Gender::parse(&gender_raw), dates::parse_day(&birthday_raw)) {
        (Ok(gender), Ok(birthday)) => (gender, birthday),
        (gender, birthday) => {
            let mut errors = BTreeMap::new();
            if let Err(e) = gender {
                errors.insert("gender".to_string(), e.to_string());
            }
            if let Err(e) = birthday {
                errors.insert("birthday".to_string(), e.to_string());
            }
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: "Validation error".into(),
                    errors: Some(errors),
                },
            );
        }
    };

    let jwt = match get_jwt_validator(&state) {
        Ok(j) => j,
        Err(resp) => return resp,
    };

    let collection = match state.mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Users collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during registration".into(),
                    errors: None,
                },
            );
        }
    };

    let email = email.trim().to_string();

    match collection.find_one(doc! { "email": &email }).await {
        Ok(Some(_)) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: "User already exists".into(),
                    errors: None,
                },
            )
        }
        Ok(None) => {}
        Err(e) => {
            error!("User lookup error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during registration".into(),
                    errors: None,
                },
            );
        }
    }

    let password_hash = match hash_password(&password) {
        Ok(h) => h,
        Err(e) => {
            error!("Password hashing error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during registration".into(),
                    errors: None,
                },
            );
        }
    };

    let mut user = UserDoc::new(
        name.trim().to_string(),
        surname.trim().to_string(),
        birthday,
        gender,
        email,
        password_hash,
    );

    let user_id = match collection.insert_one(user.clone()).await {
        Ok(id) => id,
        Err(e) => {
            // Unique index on email catches the register/register race
            let error_str = e.to_string();
            if error_str.contains("duplicate key") || error_str.contains("E11000") {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &MessageResponse {
                        message: "User already exists".into(),
                        errors: None,
                    },
                );
            }
            error!("User insert error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during registration".into(),
                    errors: None,
                },
            );
        }
    };
    user._id = Some(user_id);

    let token = match jwt.generate_token(TokenInput {
        user_id: user_id.to_hex(),
        email: user.email.clone(),
    }) {
        Ok(t) => t,
        Err(e) => {
            error!("Token generation error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during registration".into(),
                    errors: None,
                },
            );
        }
    };

    info!("Registered new user: {}", user.email);

    json_response(
        StatusCode::CREATED,
        &AuthResponse {
            message: "User registered successfully".into(),
            token: Some(token),
            user: UserResponse::from_doc(&user),
        },
    )
}

/// POST /auth/login
///
/// Authenticate with email and password.
///
/// Flow:
/// 1. Look up the user by email in MongoDB
/// 2. Verify the password hash with argon2
/// 3. Generate and return a JWT token
async fn handle_login(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &MessageResponse {
                    message: format!("Invalid JSON body: {}", e),
                    errors: None,
                },
            )
        }
    };

    let email = body.email.unwrap_or_default();
    let password = body.password.unwrap_or_default();

    if email.trim().is_empty() || password.is_empty() {
        return json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: "Email and password are required".into(),
                errors: None,
            },
        );
    }

    let jwt = match get_jwt_validator(&state) {
        Ok(j) => j,
        Err(resp) => return resp,
    };

    let collection = match state.mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Users collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during login".into(),
                    errors: None,
                },
            );
        }
    };

    let user = match collection.find_one(doc! { "email": email.trim() }).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!("Login failed - user not found: {}", email.trim());
            return json_response(
                StatusCode::NOT_FOUND,
                &MessageResponse {
                    message: "User not found".into(),
                    errors: None,
                },
            );
        }
        Err(e) => {
            error!("User lookup error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during login".into(),
                    errors: None,
                },
            );
        }
    };

    let password_valid = match verify_password(&password, &user.password_hash) {
        Ok(v) => v,
        Err(e) => {
            error!("Password verification error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during login".into(),
                    errors: None,
                },
            );
        }
    };

    if !password_valid {
        warn!("Login failed - invalid credentials: {}", user.email);
        return json_response(
            StatusCode::BAD_REQUEST,
            &MessageResponse {
                message: "Invalid credentials".into(),
                errors: None,
            },
        );
    }

    let user_id = match user._id {
        Some(id) => id,
        None => {
            error!("User document missing _id: {}", user.email);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during login".into(),
                    errors: None,
                },
            );
        }
    };

    let token = match jwt.generate_token(TokenInput {
        user_id: user_id.to_hex(),
        email: user.email.clone(),
    }) {
        Ok(t) => t,
        Err(e) => {
            error!("Token generation error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during login".into(),
                    errors: None,
                },
            );
        }
    };

    info!("User logged in: {}", user.email);

    json_response(
        StatusCode::OK,
        &AuthResponse {
            message: "Login successful".into(),
            token: Some(token),
            user: UserResponse::from_doc(&user),
        },
    )
}

/// GET /auth/verify-token
///
/// Check the bearer token and return the account it belongs to. The user
/// may have been removed after the token was issued.
async fn handle_verify_token(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let auth_header = match get_auth_header(&req) {
        Some(h) => h.to_string(),
        None => {
            return json_response(
                StatusCode::UNAUTHORIZED,
                &MessageResponse {
                    message: "No token provided".into(),
                    errors: None,
                },
            )
        }
    };

    let jwt = match get_jwt_validator(&state) {
        Ok(j) => j,
        Err(resp) => return resp,
    };

    let token = match extract_token_from_header(Some(&auth_header)) {
        Some(t) => t,
        None => {
            return json_response(
                StatusCode::UNAUTHORIZED,
                &MessageResponse {
                    message: "Invalid token".into(),
                    errors: None,
                },
            )
        }
    };

    let result = jwt.verify_token(token);
    let claims = match result.claims {
        Some(c) if result.valid => c,
        _ => {
            warn!("Token verification failed: {:?}", result.error);
            return json_response(
                StatusCode::UNAUTHORIZED,
                &MessageResponse {
                    message: "Invalid token".into(),
                    errors: None,
                },
            );
        }
    };

    let user_id = match ObjectId::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            warn!("Token subject is not a valid id: {}", claims.sub);
            return json_response(
                StatusCode::UNAUTHORIZED,
                &MessageResponse {
                    message: "Invalid token".into(),
                    errors: None,
                },
            );
        }
    };

    let collection = match state.mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            error!("Users collection error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during token verification".into(),
                    errors: None,
                },
            );
        }
    };

    let user = match collection.find_one(doc! { "_id": user_id }).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return json_response(
                StatusCode::NOT_FOUND,
                &MessageResponse {
                    message: "User not found".into(),
                    errors: None,
                },
            )
        }
        Err(e) => {
            error!("User lookup error: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &MessageResponse {
                    message: "Server error during token verification".into(),
                    errors: None,
                },
            );
        }
    };

    json_response(
        StatusCode::OK,
        &AuthResponse {
            message: "Token is valid".into(),
            token: None,
            user: UserResponse::from_doc(&user),
        },
    )
}

// =============================================================================
// Helper Functions
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
                        errors: None,
                    },
                )
            })
        }
        None => Err(json_response(
            StatusCode::NOT_IMPLEMENTED,
            &MessageResponse {
                message: "Authentication not enabled (missing JWT_SECRET)".into(),
                errors: None,
            },
        )),
    }
}

// =============================================================================
// Main Router
// =============================================================================

/// Handle auth-related HTTP requests.
///
/// Returns Some(response) if the request was handled, None if not an auth route.
pub async fn handle_auth_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    // Only handle /auth/* routes
    if !path.starts_with("/auth") {
        return None;
    }

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    // Remove query string for matching
    let path = path.split('?').next().unwrap_or(path);

    let response = match (method, path) {
        (&Method::POST, "/auth/register") => handle_register(req, state).await,
        (&Method::POST, "/auth/login") => handle_login(req, state).await,
        (&Method::GET, "/auth/verify-token") => handle_verify_token(req, state).await,

        // Method not allowed
        (_, "/auth/register") | (_, "/auth/login") | (_, "/auth/verify-token") => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &MessageResponse {
                message: "Method not allowed".into(),
                errors: None,
            },
        ),

        // Auth endpoint not found
        _ => json_response(
            StatusCode::NOT_FOUND,
            &MessageResponse {
                message: "Auth endpoint not found".into(),
                errors: None,
            },
        ),
    };

    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_user_response_leaves_out_password_hash() {
        let mut user = UserDoc::new(
            "Ada".to_string(),
            "Lovelace".to_string(),
            chrono::Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap(),
            Gender::Female,
            "ada@example.com".to_string(),
            "$argon2id$v=19$m=19456,t=2,p=1$secret".to_string(),
        );
        user._id = Some(ObjectId::new());

        let json = serde_json::to_value(UserResponse::from_doc(&user)).unwrap();
        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(json["gender"], "female");
        assert_eq!(json["birthday"], "1990-01-01T00:00:00.000Z");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn test_message_response_skips_empty_errors() {
        let json = serde_json::to_string(&MessageResponse {
            message: "User already exists".into(),
            errors: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"message":"User already exists"}"#);
    }

    #[test]
    fn test_message_response_includes_field_errors() {
        let mut errors = BTreeMap::new();
        errors.insert(
            "gender".to_string(),
            "Gender must be either \"male\" or \"female\"".to_string(),
        );
        let json = serde_json::to_value(MessageResponse {
            message: "Validation error".into(),
            errors: Some(errors),
        })
        .unwrap();
        assert_eq!(json["message"], "Validation error");
        assert_eq!(
            json["errors"]["gender"],
            "Gender must be either \"male\" or \"female\""
        );
    }

    #[test]
    fn test_auth_response_skips_token_when_absent() {
        let user = UserDoc::new(
            "Ada".to_string(),
            "Lovelace".to_string(),
            chrono::Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap(),
            Gender::Female,
            "ada@example.com".to_string(),
            "hash".to_string(),
        );
        let json = serde_json::to_value(AuthResponse {
            message: "Token is valid".into(),
            token: None,
            user: UserResponse::from_doc(&user),
        })
        .unwrap();
        assert!(json.get("token").is_none());
    }

    #[test]
    fn test_register_request_tolerates_missing_fields() {
        let body: RegisterRequest = serde_json::from_str(r#"{"email":"a@b.c"}"#).unwrap();
        assert_eq!(body.email.as_deref(), Some("a@b.c"));
        assert!(body.password.is_none());
        assert!(body.gender.is_none());
    }
}
