use actix_web::body::BoxBody;
use actix_web::http::{header::ContentType, StatusCode};
use actix_web::{error, web, HttpRequest, HttpResponse, Responder};
use log::*;
use serde::Serialize;

const INTERNAL_ERROR: &str = "The request could not be completed";

/// JSON indented by four spaces, with non-ASCII text left as-is.
pub struct PrettyJson<T> {
    status: StatusCode,
    value: T,
}

impl<T: Serialize> PrettyJson<T> {
    pub fn ok(value: T) -> Self {
        Self::with_status(StatusCode::OK, value)
    }

    pub fn with_status(status: StatusCode, value: T) -> Self {
        PrettyJson { status, value }
    }

    pub fn into_response(self) -> HttpResponse {
        match to_pretty_vec(&self.value) {
            Ok(body) => HttpResponse::build(self.status)
                .insert_header(ContentType::json())
                .body(body),
            Err(e) => {
                error!("Could not serialize response body: {}", e);
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}

impl<T: Serialize> Responder for PrettyJson<T> {
    type Body = BoxBody;

    fn respond_to(self, _: &HttpRequest) -> HttpResponse<Self::Body> {
        self.into_response()
    }
}

pub fn to_pretty_vec<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ErrorBody {
    pub fn rejected(errors: Vec<String>) -> Self {
        ErrorBody {
            status: "error",
            message: "Order data is invalid".to_string(),
            errors: Some(errors),
            error: None,
        }
    }

    /// Details stay in the server log.
    pub fn internal() -> Self {
        ErrorBody {
            status: "error",
            message: "Internal server error".to_string(),
            errors: None,
            error: Some(INTERNAL_ERROR.to_string()),
        }
    }
}

pub fn internal_error(err: anyhow::Error) -> HttpResponse {
    error!("Request failed: {:?}", err);
    PrettyJson::with_status(StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::internal())
        .into_response()
}

/// Bodies that fail to parse get the same shape as validation failures.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        warn!("Malformed JSON body for {}: {}", req.uri(), err);
        let body = ErrorBody::rejected(vec![format!("Malformed request body: {}", err)]);
        let response = PrettyJson::with_status(StatusCode::BAD_REQUEST, body).into_response();
        error::InternalError::from_response(err, response).into()
    })
}
