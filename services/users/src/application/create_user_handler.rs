// ユーザー作成ハンドラー
//
// POST /users のリクエストボディを検証し、UserDirectoryでユーザーを作成する。

use lambda_http::http::StatusCode;
use lambda_http::{Body, Request, Response};
use tracing::{error, info, warn};

use crate::application::api_response::{error_response, success_response};
use crate::application::user_directory::{UserDirectory, UserDirectoryError};
use crate::domain::{AlternateKey, CreateUserInput, UserInputValidator};
use crate::infrastructure::UserStore;

/// ユーザー作成ハンドラー
pub struct CreateUserHandler<'a, S>
where
    S: UserStore,
{
    directory: &'a UserDirectory<S>,
}

impl<'a, S> CreateUserHandler<'a, S>
where
    S: UserStore,
{
    pub fn new(directory: &'a UserDirectory<S>) -> Self {
        Self { directory }
    }

    /// リクエストを処理してレスポンスを生成
    ///
    /// # ステータス
    /// - 201: 作成成功（公開用レコードを返す）
    /// - 400: ボディなし / JSON不正 / バリデーションエラー
    /// - 409: email または username が既に使用されている
    /// - 500: ストア障害
    pub async fn handle(&self, request: &Request) -> Response<Body> {
        let body: &[u8] = request.body().as_ref();
        if body.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "Request body is required");
        }

        let input: CreateUserInput = match serde_json::from_slice(body) {
            Ok(input) => input,
            Err(e) => {
                warn!(error = %e, "リクエストボディのパースに失敗");
                return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
            }
        };

        if let Err(e) = UserInputValidator::validate_create(&input) {
            warn!(error = %e, "入力バリデーションエラー");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }

        let record = match self.directory.create(&input).await {
            Ok(record) => record,
            Err(UserDirectoryError::DuplicateKey(kind)) => {
                return error_response(StatusCode::CONFLICT, duplicate_message(kind));
            }
            Err(e) => {
                error!(error = %e, "ユーザー作成失敗");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user");
            }
        };

        match self.directory.project_public(&record) {
            Ok(public) => {
                info!(user_id = %public.id, "ユーザー作成レスポンス送信");
                success_response(StatusCode::CREATED, "User created successfully", Some(&public))
            }
            Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user"),
        }
    }
}

fn duplicate_message(kind: AlternateKey) -> &'static str {
    match kind {
        AlternateKey::Email => "User with this email already exists",
        AlternateKey::Username => "User with this username already exists",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::api_response::body_json;
    use crate::application::user_directory::tests::create_test_directory;
    use crate::infrastructure::UserStoreError;
    use serde_json::json;

    fn post(body: Body) -> Request {
        Request::new(body)
    }

    fn valid_body() -> Body {
        Body::Text(
            json!({"email": "A@Test.com", "password": "secret123", "username": "Bob"}).to_string(),
        )
    }

    #[tokio::test]
    async fn test_create_returns_201_with_public_record() {
        let (directory, _) = create_test_directory();
        let handler = CreateUserHandler::new(&directory);

        let response = handler.handle(&post(valid_body())).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(&response);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "User created successfully");
        assert_eq!(body["data"]["email"], "a@test.com");
        assert_eq!(body["data"]["username"], "bob");
        assert!(body["data"]["id"].is_string());
        assert!(body["data"]["createdAt"].is_string());
        assert!(body["data"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_empty_body() {
        let (directory, _) = create_test_directory();
        let handler = CreateUserHandler::new(&directory);

        let response = handler.handle(&post(Body::Empty)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&response)["message"], "Request body is required");
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let (directory, _) = create_test_directory();
        let handler = CreateUserHandler::new(&directory);

        let response = handler.handle(&post(Body::Text("{not json".to_string()))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&response)["message"], "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let (directory, store) = create_test_directory();
        let handler = CreateUserHandler::new(&directory);

        let body = Body::Text(json!({"email": "a@test.com"}).to_string());
        let response = handler.handle(&post(body)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(&response)["message"],
            "Email, password, and username are required"
        );
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_short_password() {
        let (directory, _) = create_test_directory();
        let handler = CreateUserHandler::new(&directory);

        let body = Body::Text(
            json!({"email": "a@test.com", "password": "short", "username": "bob"}).to_string(),
        );
        let response = handler.handle(&post(body)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(&response)["message"],
            "password must be between 8 and 128 characters"
        );
    }

    #[tokio::test]
    async fn test_duplicate_email_returns_409() {
        let (directory, _) = create_test_directory();
        let handler = CreateUserHandler::new(&directory);
        handler.handle(&post(valid_body())).await;

        let body = Body::Text(
            json!({"email": "a@TEST.com", "password": "secret123", "username": "carol"})
                .to_string(),
        );
        let response = handler.handle(&post(body)).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(&response)["message"],
            "User with this email already exists"
        );
    }

    #[tokio::test]
    async fn test_duplicate_username_returns_409() {
        let (directory, _) = create_test_directory();
        let handler = CreateUserHandler::new(&directory);
        handler.handle(&post(valid_body())).await;

        let body = Body::Text(
            json!({"email": "other@test.com", "password": "secret123", "username": "BOB"})
                .to_string(),
        );
        let response = handler.handle(&post(body)).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(&response)["message"],
            "User with this username already exists"
        );
    }

    #[tokio::test]
    async fn test_store_failure_returns_500() {
        let (directory, store) = create_test_directory();
        store.set_put_error(UserStoreError::WriteError("access denied".to_string()));
        let handler = CreateUserHandler::new(&directory);

        let response = handler.handle(&post(valid_body())).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(&response)["message"], "Failed to create user");
    }
}
