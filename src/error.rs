use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::Request;

/// Closed error taxonomy surfaced to KakaoIngress and AgentEgress callers.
/// Each variant renders as a JSON body `{"error": "<CODE>", "message": "..."}` with a fixed status.
#[derive(Debug)]
pub enum RelayError {
    Validation(String),
    MissingRequired(String),
    Unauthorized,
    NotFound(&'static str),
    CallbackExpired,
    CallbackFailed(String),
    AlreadyPaired,
    AlreadyUsed,
    ExpiredCode,
    InvalidCode,
    RateLimited { retry_after_secs: u64 },
    Internal(String),
}

impl RelayError {
    fn code(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "VALIDATION_ERROR",
            RelayError::MissingRequired(_) => "MISSING_REQUIRED",
            RelayError::Unauthorized => "SESSION_NOT_PAIRED",
            RelayError::NotFound(_) => "NOT_FOUND",
            RelayError::CallbackExpired => "CALLBACK_EXPIRED",
            RelayError::CallbackFailed(_) => "CALLBACK_FAILED",
            RelayError::AlreadyPaired => "ALREADY_PAIRED",
            RelayError::AlreadyUsed => "ALREADY_USED",
            RelayError::ExpiredCode => "EXPIRED_CODE",
            RelayError::InvalidCode => "INVALID_CODE",
            RelayError::RateLimited { .. } => "RATE_LIMITED",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> Status {
        match self {
            RelayError::Validation(_) | RelayError::MissingRequired(_) | RelayError::CallbackExpired => {
                Status::BadRequest
            }
            RelayError::Unauthorized => Status::Unauthorized,
            RelayError::NotFound(_) => Status::NotFound,
            RelayError::CallbackFailed(_) => Status::BadGateway,
            RelayError::AlreadyPaired
            | RelayError::AlreadyUsed
            | RelayError::ExpiredCode
            | RelayError::InvalidCode => Status::Conflict,
            RelayError::RateLimited { .. } => Status::TooManyRequests,
            RelayError::Internal(_) => Status::InternalServerError,
        }
    }

    fn message(&self) -> String {
        match self {
            RelayError::Validation(m) | RelayError::MissingRequired(m) => m.clone(),
            RelayError::Unauthorized => "not authorized".to_string(),
            RelayError::NotFound(what) => format!("{what} not found"),
            RelayError::CallbackExpired => "callback url has expired".to_string(),
            RelayError::CallbackFailed(m) => m.clone(),
            RelayError::AlreadyPaired => "conversation is already paired".to_string(),
            RelayError::AlreadyUsed => "pairing code already used".to_string(),
            RelayError::ExpiredCode => "pairing code has expired".to_string(),
            RelayError::InvalidCode => "invalid pairing code".to_string(),
            RelayError::RateLimited { retry_after_secs } => {
                format!("rate limited, retry after {retry_after_secs}s")
            }
            RelayError::Internal(m) => {
                eprintln!("⚠️ internal error: {m}");
                "internal error".to_string()
            }
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for RelayError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let retry_after = match &self {
            RelayError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": self.message(),
        }));

        let mut response = Response::build_from(body.respond_to(req)?)
            .status(status)
            .finalize();

        if let Some(secs) = retry_after {
            response.set_header(rocket::http::Header::new("Retry-After", secs.to_string()));
        }

        Ok(response)
    }
}
