// HTTPレスポンスエンベロープ
//
// 全エンドポイント共通の`{success, message, data?}`形式のJSONと
// CORSヘッダーを付与したレスポンスを生成する。

use lambda_http::http::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};
use serde::Serialize;
use tracing::error;

/// シリアライズ失敗時に返す固定ボディ
const FALLBACK_BODY: &str = r#"{"success":false,"message":"Internal server error"}"#;

/// レスポンスエンベロープ
#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    success: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
}

/// 成功レスポンスを生成
///
/// `data`が`None`の場合は`data`フィールドを省略する。
pub fn success_response<T: Serialize>(
    status: StatusCode,
    message: &str,
    data: Option<&T>,
) -> Response<Body> {
    build_response(
        status,
        &Envelope {
            success: true,
            message,
            data,
        },
    )
}

/// エラーレスポンスを生成
pub fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    build_response(
        status,
        &Envelope::<()> {
            success: false,
            message,
            data: None,
        },
    )
}

fn build_response<T: Serialize>(status: StatusCode, envelope: &Envelope<'_, T>) -> Response<Body> {
    let (status, json) = match serde_json::to_string(envelope) {
        Ok(json) => (status, json),
        Err(e) => {
            error!(error = %e, "レスポンスのシリアライズに失敗");
            (StatusCode::INTERNAL_SERVER_ERROR, FALLBACK_BODY.to_string())
        }
    };

    let mut response = Response::new(Body::Text(json));
    *response.status_mut() = status;
    *response.headers_mut() = build_headers();
    response
}

/// 共通ヘッダーを生成
///
/// - Content-Type: application/json
/// - Access-Control-Allow-Origin: *
fn build_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers
}

/// テスト用: レスポンスボディをJSONとして取得
#[cfg(test)]
pub(crate) fn body_json(response: &Response<Body>) -> serde_json::Value {
    let body = match response.body() {
        Body::Text(text) => text.clone(),
        Body::Binary(bytes) => String::from_utf8(bytes.clone()).unwrap(),
        Body::Empty => String::new(),
        _ => panic!("予期しないBody型"),
    };
    serde_json::from_str(&body).unwrap()
}
