use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use warden_core::error::WardenError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        let Some(e) = self.0.downcast_ref::<WardenError>() else {
            return StatusCode::INTERNAL_SERVER_ERROR;
        };
        match e {
            WardenError::UnknownActionId(_) | WardenError::UnknownTier(_) => StatusCode::NOT_FOUND,
            WardenError::DuplicateActionId(_) | WardenError::ConfigExists(_) => {
                StatusCode::CONFLICT
            }
            WardenError::UnknownActionType(_)
            | WardenError::InvalidDecision(_)
            | WardenError::InvalidEditPayload(_)
            | WardenError::InvalidConfidence(_)
            | WardenError::InvalidTarget(_)
            | WardenError::InvalidTierChain(_) => StatusCode::BAD_REQUEST,
            WardenError::ResourceExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            WardenError::Exhausted { .. } | WardenError::Runtime(_) => StatusCode::BAD_GATEWAY,
            WardenError::Io(_) | WardenError::Yaml(_) | WardenError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_id_maps_to_404() {
        let err = AppError(WardenError::UnknownActionId("perm-1".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicate_action_id_maps_to_409() {
        let err = AppError(WardenError::DuplicateActionId("perm-1".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn invalid_decision_maps_to_400() {
        let err = AppError(WardenError::InvalidDecision("maybe".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_edit_payload_maps_to_400() {
        let err = AppError(WardenError::InvalidEditPayload("kind mismatch".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_action_type_maps_to_400() {
        let err = AppError(WardenError::UnknownActionType("hover".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn resource_exhausted_maps_to_503() {
        let err = AppError(
            WardenError::ResourceExhausted {
                requested: "content".into(),
                free_gb: 0.4,
            }
            .into(),
        );
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn io_error_maps_to_500() {
        let err = AppError(WardenError::Io(std::io::Error::other("disk full")).into());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn non_warden_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_target_maps_to_400() {
        let err = AppError(WardenError::InvalidTarget("x without y".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError(WardenError::UnknownActionId("x".into()).into()).into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
