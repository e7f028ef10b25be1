use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use system::serde_json::json;
use system::RoomIdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("relay server is not running")]
    RelayUnavailable,
    #[error(transparent)]
    RoomId(#[from] RoomIdError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        log::error!("Request failed: {}", self);
        HttpResponse::build(self.status_code()).json(json!({ "message": "Some server error" }))
    }
}
