//! Typed replies of the endpoint client.

use bytes::Bytes;
use http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Error, Response, Result, from_json};

/// Error payload of a non-2xx reply: `{"errors": ["...", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Messages reported by the server, most relevant first.
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// A reply of the transport API: the raw response plus its decoded payload.
///
/// 2xx replies carry their `data` envelope decoded as `T`; other replies carry the
/// server's [`ErrorPayload`] when the body has that shape.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    response: Response,
    data: Option<T>,
    error_payload: Option<ErrorPayload>,
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Decode a raw response.
    ///
    /// A 2xx reply with an empty body has no data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonDeserialization`] if a non-empty 2xx body is not a
    /// `{"data": ...}` envelope of `T`. Undecodable error bodies are not an error:
    /// the reply simply has no error payload.
    pub fn from_response(response: Response) -> Result<Self> {
        if response.is_success() {
            let data = if response.body().is_empty() {
                None
            } else {
                Some(from_json::<Envelope<T>>(response.body())?.data)
            };
            return Ok(Self {
                response,
                data,
                error_payload: None,
            });
        }

        let error_payload = from_json::<ErrorPayload>(response.body()).ok();
        Ok(Self {
            response,
            data: None,
            error_payload,
        })
    }
}

impl<T> ApiResponse<T> {
    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.response.status()
    }

    /// Reason phrase of the status code.
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        self.response.status_text()
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Raw response body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        self.response.body()
    }

    /// The underlying response.
    #[must_use]
    pub const fn response(&self) -> &Response {
        &self.response
    }

    /// Decoded payload of a 2xx reply.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Take the decoded payload of a 2xx reply.
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Error payload of a non-2xx reply, when the body had that shape.
    #[must_use]
    pub const fn error_payload(&self) -> Option<&ErrorPayload> {
        self.error_payload.as_ref()
    }

    /// The first error message of the reply as [`Error::Api`], if there is one.
    ///
    /// Further messages are only reachable through [`ApiResponse::error_payload`].
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        self.error_payload
            .as_ref()
            .and_then(|payload| payload.errors.first())
            .map(|message| Error::api(message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, SuccessResult};

    fn response(status: u16, body: &'static str) -> Response {
        Response::new(status, HeaderMap::new(), body)
    }

    #[test]
    fn decodes_data_envelope() {
        let reply = ApiResponse::<Vec<Channel>>::from_response(response(
            200,
            r#"{"data": [{"id": 1, "type": "telegram", "is_active": true}]}"#,
        ))
        .expect("decoded");

        assert_eq!(reply.status(), 200);
        assert_eq!(reply.status_text(), "OK");
        assert_eq!(reply.data().map(Vec::len), Some(1));
        assert!(reply.error_payload().is_none());
        assert!(reply.error().is_none());
    }

    #[test]
    fn first_error_message_wins() {
        let reply = ApiResponse::<SuccessResult>::from_response(response(
            400,
            r#"{"errors": ["channel not found", "second problem"]}"#,
        ))
        .expect("decoded");

        assert!(reply.data().is_none());
        assert_eq!(
            reply.error_payload().map(|payload| payload.errors.len()),
            Some(2)
        );

        let err = reply.error().expect("api error");
        assert!(err.is_api());
        assert_eq!(err.to_string(), "channel not found");
    }

    #[test]
    fn empty_error_list_is_no_error() {
        let reply =
            ApiResponse::<SuccessResult>::from_response(response(422, r#"{"errors": []}"#))
                .expect("decoded");

        assert!(reply.error_payload().is_some());
        assert!(reply.error().is_none());
    }

    #[test]
    fn non_json_error_body_is_kept_raw() {
        let reply = ApiResponse::<SuccessResult>::from_response(response(502, "Bad Gateway"))
            .expect("decoded");

        assert_eq!(reply.status_text(), "Bad Gateway");
        assert!(reply.error_payload().is_none());
        assert!(reply.error().is_none());
        assert_eq!(reply.body().as_ref(), b"Bad Gateway");
    }

    #[test]
    fn malformed_success_body_is_an_error() {
        let result =
            ApiResponse::<SuccessResult>::from_response(response(200, r#"{"data": {"success": "yes"}}"#));

        assert!(matches!(
            result,
            Err(Error::JsonDeserialization { ref path, .. }) if path.contains("success")
        ));
    }

    #[test]
    fn empty_success_body_has_no_data() {
        let reply = ApiResponse::<SuccessResult>::from_response(response(204, ""))
            .expect("decoded");

        assert_eq!(reply.status(), 204);
        assert!(reply.into_data().is_none());
    }
}
