use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use std::env;
use std::fmt::{self, Debug, Display};

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub code: i32,
    pub message: String,
    pub violations: Vec<Violation>,
}

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub const ENV_VAR_ERROR: i32 = 1;
pub const DATABASE_ERROR: i32 = 2;
pub const CONFIG_ERROR: i32 = 3;
pub const AUTHORIZOR_ERROR: i32 = 4;
pub const UNEXPECTED_ERROR: i32 = 5;

pub const INVALID_STATE_ERROR: i32 = 100;
pub const VALIDATION_ERROR: i32 = 101;
pub const CAPACITY_EXCEEDED_ERROR: i32 = 102;
pub const ALREADY_JOINED_ERROR: i32 = 103;
pub const NOT_A_PASSENGER_ERROR: i32 = 104;
pub const OTP_MISMATCH_ERROR: i32 = 105;
pub const NOT_FOUND_ERROR: i32 = 106;
pub const UNAUTHORIZED_ERROR: i32 = 107;
pub const UNAUTHENTICATED_ERROR: i32 = 108;

impl Error {
    fn new(code: i32, message: &str) -> Self {
        Self {
            code,
            message: message.into(),
            violations: vec![],
        }
    }

    pub fn invalid_state_error() -> Self {
        Self::new(INVALID_STATE_ERROR, "invalid state")
    }

    pub fn validation_error(violations: Vec<Violation>) -> Self {
        Self {
            violations,
            ..Self::new(VALIDATION_ERROR, "validation error")
        }
    }

    pub fn capacity_exceeded_error() -> Self {
        Self::new(CAPACITY_EXCEEDED_ERROR, "no seats available")
    }

    pub fn already_joined_error() -> Self {
        Self::new(ALREADY_JOINED_ERROR, "already part of this ride")
    }

    pub fn not_a_passenger_error() -> Self {
        Self::new(NOT_A_PASSENGER_ERROR, "not a passenger in this ride")
    }

    pub fn otp_mismatch_error() -> Self {
        Self::new(OTP_MISMATCH_ERROR, "invalid otp")
    }

    pub fn not_found_error() -> Self {
        Self::new(NOT_FOUND_ERROR, "not found")
    }

    pub fn unauthorized_error() -> Self {
        Self::new(UNAUTHORIZED_ERROR, "unauthorized")
    }

    pub fn unauthenticated_error() -> Self {
        Self::new(UNAUTHENTICATED_ERROR, "unauthenticated")
    }

    pub fn env_var_error() -> Self {
        Self::new(ENV_VAR_ERROR, "environment variable error")
    }

    pub fn database_error<T: Debug>(err: T) -> Self {
        tracing::error!("database error: {:?}", err);
        Self::new(DATABASE_ERROR, "database error")
    }

    pub fn config_error(message: &str) -> Self {
        Self::new(CONFIG_ERROR, message)
    }

    pub fn authorizor_error<T: Debug>(err: T) -> Self {
        tracing::error!("authorizor error: {:?}", err);
        Self::new(AUTHORIZOR_ERROR, "authorizor error")
    }

    pub fn unexpected_error() -> Self {
        Self::new(UNEXPECTED_ERROR, "unexpected error")
    }

    pub fn is_invalid_state_error(&self) -> bool {
        self.code == INVALID_STATE_ERROR
    }

    pub fn is_validation_error(&self) -> bool {
        self.code == VALIDATION_ERROR
    }

    pub fn is_capacity_exceeded_error(&self) -> bool {
        self.code == CAPACITY_EXCEEDED_ERROR
    }

    pub fn is_already_joined_error(&self) -> bool {
        self.code == ALREADY_JOINED_ERROR
    }

    pub fn is_not_a_passenger_error(&self) -> bool {
        self.code == NOT_A_PASSENGER_ERROR
    }

    pub fn is_otp_mismatch_error(&self) -> bool {
        self.code == OTP_MISMATCH_ERROR
    }

    pub fn is_not_found_error(&self) -> bool {
        self.code == NOT_FOUND_ERROR
    }

    pub fn is_unauthorized_error(&self) -> bool {
        self.code == UNAUTHORIZED_ERROR
    }

    pub fn is_internal(&self) -> bool {
        (1..=99).contains(&self.code)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(_: env::VarError) -> Self {
        Self::env_var_error()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::database_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        Self::authorizor_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.code {
            1..=99 => StatusCode::INTERNAL_SERVER_ERROR,
            NOT_FOUND_ERROR => StatusCode::NOT_FOUND,
            UNAUTHORIZED_ERROR => StatusCode::FORBIDDEN,
            UNAUTHENTICATED_ERROR => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        };

        let body = if self.is_internal() {
            json!({
                "code": self.code,
                "error": "Internal Server Error",
            })
        } else {
            json!({
                "code": self.code,
                "error": self.message,
                "violations": self.violations,
            })
        };

        (status, Json(body)).into_response()
    }
}

#[test]
fn internal_errors_are_masked() {
    let response = Error::database_error("connection reset").into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = Error::capacity_exceeded_error().into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = Error::not_found_error().into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = Error::unauthorized_error().into_response();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[test]
fn predicates_match_constructors() {
    assert!(Error::invalid_state_error().is_invalid_state_error());
    assert!(Error::otp_mismatch_error().is_otp_mismatch_error());
    assert!(!Error::otp_mismatch_error().is_invalid_state_error());

    let err = Error::validation_error(vec![Violation::new("max_seats", "out of range")]);
    assert!(err.is_validation_error());
    assert_eq!(err.violations[0].field, "max_seats");
}
