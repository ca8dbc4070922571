use reqwest::Response;
use shared::models::ErrorResponse;

use crate::error::ClientError;

/// Maps a non-success REST response to [`ClientError::Api`], preferring the
/// backend's structured error body when it parses.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map_or(body, |parsed| parsed.to_string());
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_parsing_prefers_structured_message() {
        let parsed: ErrorResponse =
            serde_json::from_str(r#"{"message":"room not found"}"#).unwrap();
        assert_eq!(parsed.to_string(), "room not found");
    }
}
