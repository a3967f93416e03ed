// 代替キー検索ハンドラー
//
// GET /users/lookup?email=... または ?username=... でユーザーを検索する。
// クエリパラメータはどちらか一方のみ指定する。

use lambda_http::http::StatusCode;
use lambda_http::{Body, Request, RequestExt, Response};
use tracing::{error, info};

use crate::application::api_response::error_response;
use crate::application::get_user_handler::respond_with_user;
use crate::application::user_directory::UserDirectory;
use crate::domain::AlternateKey;
use crate::infrastructure::UserStore;

const LOOKUP_PARAMETER_ERROR: &str = "Exactly one of email or username is required";

/// 代替キー検索ハンドラー
pub struct LookupUserHandler<'a, S>
where
    S: UserStore,
{
    directory: &'a UserDirectory<S>,
}

impl<'a, S> LookupUserHandler<'a, S>
where
    S: UserStore,
{
    pub fn new(directory: &'a UserDirectory<S>) -> Self {
        Self { directory }
    }

    pub async fn handle(&self, request: &Request) -> Response<Body> {
        let query = request.query_string_parameters();
        let mut given = AlternateKey::ALL.into_iter().filter_map(|kind| {
            query
                .first(kind.attribute_name())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| (kind, value))
        });

        let (kind, value) = match (given.next(), given.next()) {
            (Some(pair), None) => pair,
            _ => return error_response(StatusCode::BAD_REQUEST, LOOKUP_PARAMETER_ERROR),
        };

        match self.directory.find_by_alternate_key(kind, value).await {
            Ok(Some(record)) => respond_with_user(self.directory, &record, "Failed to get user"),
            Ok(None) => {
                info!(kind = %kind, "ユーザーが見つからない");
                error_response(StatusCode::NOT_FOUND, "User not found")
            }
            Err(e) => {
                error!(kind = %kind, error = %e, "代替キー検索失敗");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to get user")
            }
        }
    }
}
