use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// JSON envelope returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T, E = T> {
    success: bool,
    data: Option<T>,
    error_data: Option<E>,
    message: Option<String>,
}

impl<T, E> ApiResponse<T, E> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error_data: None,
            message: None,
        }
    }

    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error_data: None,
            message: Some(message.to_string()),
        }
    }

    pub fn error_with_data(data: E, message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error_data: Some(data),
            message: Some(message.to_string()),
        }
    }
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::warn!(location, "refusing to redirect to invalid location");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_every_field() {
        let value = serde_json::to_value(ApiResponse::<u32, ()>::success(7)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "success": true,
                "data": 7,
                "error_data": null,
                "message": null
            })
        );

        let value =
            serde_json::to_value(ApiResponse::<(), Vec<&str>>::error_with_data(vec!["x"], "bad"))
                .unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error_data"][0], "x");
        assert_eq!(value["message"], "bad");
    }

    #[test]
    fn found_sets_location() {
        let response = found("/tasks");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/tasks");
    }
}
