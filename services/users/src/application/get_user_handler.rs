// ユーザー取得ハンドラー
//
// GET /users/{id} のパスパラメータからユーザーを取得する。

use lambda_http::http::StatusCode;
use lambda_http::{Body, Request, RequestExt, Response};
use tracing::{error, info};

use crate::application::api_response::{error_response, success_response};
use crate::application::user_directory::UserDirectory;
use crate::domain::UserRecord;
use crate::infrastructure::UserStore;

/// ユーザー取得ハンドラー
pub struct GetUserHandler<'a, S>
where
    S: UserStore,
{
    directory: &'a UserDirectory<S>,
}

impl<'a, S> GetUserHandler<'a, S>
where
    S: UserStore,
{
    pub fn new(directory: &'a UserDirectory<S>) -> Self {
        Self { directory }
    }

    pub async fn handle(&self, request: &Request) -> Response<Body> {
        let path_parameters = request.path_parameters();
        let id = match path_parameters.first("id").map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => return error_response(StatusCode::BAD_REQUEST, "User ID is required"),
        };

        match self.directory.find_by_id(id).await {
            Ok(Some(record)) => respond_with_user(self.directory, &record, "Failed to get user"),
            Ok(None) => {
                info!(user_id = id, "ユーザーが見つからない");
                error_response(StatusCode::NOT_FOUND, "User not found")
            }
            Err(e) => {
                error!(user_id = id, error = %e, "ユーザー取得失敗");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get user")
            }
        }
    }
}

/// 取得したレコードを公開用に射影して200で返す
pub(crate) fn respond_with_user<S: UserStore>(
    directory: &UserDirectory<S>,
    record: &UserRecord,
    failure_message: &str,
) -> Response<Body> {
    match directory.project_public(record) {
        Ok(public) => success_response(StatusCode::OK, "User retrieved successfully", Some(&public)),
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, failure_message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::api_response::body_json;
    use crate::application::user_directory::tests::create_test_directory;
    use crate::domain::user_record::tests::sample_record;
    use crate::domain::CreateUserInput;
    use crate::infrastructure::UserStoreError;
    use std::collections::HashMap;

    fn get(id: Option<&str>) -> Request {
        let mut params = HashMap::new();
        if let Some(id) = id {
            params.insert("id".to_string(), id.to_string());
        }
        Request::new(Body::Empty).with_path_parameters(params)
    }

    #[tokio::test]
    async fn test_get_existing_user() {
        let (directory, _) = create_test_directory();
        let created = directory
            .create(&CreateUserInput::new("A@Test.com", "secret123", "Bob"))
            .await
            .unwrap();
        let handler = GetUserHandler::new(&directory);

        let response = handler.handle(&get(Some(&created.id))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(&response);
        assert_eq!(body["message"], "User retrieved successfully");
        assert_eq!(body["data"]["id"], created.id);
        assert_eq!(body["data"]["email"], "a@test.com");
        assert!(body["data"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_missing_id() {
        let (directory, _) = create_test_directory();
        let handler = GetUserHandler::new(&directory);

        let response = handler.handle(&get(None)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&response)["message"], "User ID is required");
    }

    #[tokio::test]
    async fn test_unknown_id_returns_404() {
        let (directory, _) = create_test_directory();
        let handler = GetUserHandler::new(&directory);

        let response = handler.handle(&get(Some("missing"))).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(&response)["message"], "User not found");
    }

    #[tokio::test]
    async fn test_guard_id_returns_404() {
        let (directory, _) = create_test_directory();
        directory
            .create(&CreateUserInput::new("a@test.com", "secret123", "bob"))
            .await
            .unwrap();
        let handler = GetUserHandler::new(&directory);

        let response = handler.handle(&get(Some("EMAIL#a@test.com"))).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_row_returns_500() {
        let (directory, store) = create_test_directory();
        let mut record = sample_record();
        record.email.clear();
        store.insert_raw(record.clone());
        let handler = GetUserHandler::new(&directory);

        let response = handler.handle(&get(Some(&record.id))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(&response)["message"], "Failed to get user");
    }

    #[tokio::test]
    async fn test_store_failure_returns_500() {
        let (directory, store) = create_test_directory();
        store.set_next_error(UserStoreError::ReadError("boom".to_string()));
        let handler = GetUserHandler::new(&directory);

        let response = handler.handle(&get(Some("some-id"))).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
