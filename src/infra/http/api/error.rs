use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use sponsorship_api_types::Envelope;

use crate::application::error::{AppError, ErrorReport};
use crate::application::slot_content::SlotContentError;

pub mod codes {
    pub const UNKNOWN_ITEM: &str = "unknown_item";
    pub const NOT_TARGETED: &str = "not_targeted";
    pub const NO_RENDERER: &str = "no_renderer";
    pub const EMPTY_RENDER: &str = "empty_render";
    pub const REPO: &str = "repo_error";
}

/// Failure of the slot-content endpoint, answered as
/// `{"success": false, "message": ...}`.
#[derive(Debug)]
pub struct SlotApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    detail: String,
}

impl SlotApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<SlotContentError> for SlotApiError {
    fn from(err: SlotContentError) -> Self {
        let detail = err.to_string();
        match err {
            SlotContentError::UnknownItem(_) => {
                Self::new(StatusCode::NOT_FOUND, codes::UNKNOWN_ITEM, "Unknown item", detail)
            }
            SlotContentError::NotTargeted { .. } => Self::new(
                StatusCode::NOT_FOUND,
                codes::NOT_TARGETED,
                "Item is not targeted to this slot",
                detail,
            ),
            SlotContentError::NoRenderer(_) => Self::new(
                StatusCode::NOT_FOUND,
                codes::NO_RENDERER,
                "No renderer registered for this slot",
                detail,
            ),
            SlotContentError::EmptyRender(_) => Self::new(
                StatusCode::NOT_FOUND,
                codes::EMPTY_RENDER,
                "Nothing to render for this slot",
                detail,
            ),
            SlotContentError::Repo(repo) => {
                let status = AppError::Repo(repo).status_code();
                Self::new(status, codes::REPO, "Slot content is unavailable", detail)
            }
        }
    }
}

impl IntoResponse for SlotApiError {
    fn into_response(self) -> Response {
        counter!("sponsorship_slot_api_failure_total", "code" => self.code).increment(1);
        let mut response = (self.status, Json(Envelope::<()>::error(self.message))).into_response();
        ErrorReport::from_message(
            "infra::http::api::slots",
            self.status,
            format!("{}: {}", self.code, self.detail),
        )
        .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::RepoError;

    #[test]
    fn content_errors_map_to_codes() {
        let err = SlotApiError::from(SlotContentError::NotTargeted {
            item: 7,
            slot: "sidebar".to_string(),
        });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), codes::NOT_TARGETED);

        let err = SlotApiError::from(SlotContentError::Repo(RepoError::Timeout));
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.code(), codes::REPO);
    }

    #[test]
    fn response_carries_report() {
        let response = SlotApiError::from(SlotContentError::UnknownItem(9)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let report = response.extensions().get::<ErrorReport>().expect("report");
        assert_eq!(report.messages, vec!["unknown_item: item 9 not found".to_string()]);
    }
}
