use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

/// Tags every request and its response with an x-request-id header. A
/// client-supplied id is kept so log lines can be correlated across
/// proxies; otherwise a fresh one is generated.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert("x-request-id", value.clone());
        let mut response = next.run(req).await;
        response.headers_mut().insert("x-request-id", value);
        return response;
    }

    next.run(req).await
}
