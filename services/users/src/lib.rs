use application::{error_response, UserDirectory};
use infrastructure::{DynamoDbConfig, DynamoDbConfigError, DynamoUserStore, RetryPolicy};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};
use tokio::sync::OnceCell;
use tracing::error;

// Domain layer modules
pub mod domain;

// Application layer modules
pub mod application;

// Infrastructure layer modules
pub mod infrastructure;

/// Lambdaエントリポイントが静的に保持するUserDirectory
///
/// warm start時にDynamoDBクライアントを再利用する。
pub type SharedDirectory = OnceCell<UserDirectory<DynamoUserStore>>;

/// 環境変数からDynamoDB版のUserDirectoryを構築する
pub async fn build_directory() -> Result<UserDirectory<DynamoUserStore>, DynamoDbConfigError> {
    let config = DynamoDbConfig::from_env().await?;
    let store = DynamoUserStore::new(config.client().clone(), config.users_table().to_string());
    Ok(UserDirectory::with_retry_policy(store, RetryPolicy::from_env()))
}

/// 保持しているUserDirectoryを取得（未初期化なら初期化）
///
/// 設定エラーの場合は500の共通エンベロープを`Err`で返す。
/// 初期化に失敗したセルは未初期化のまま残り、次のリクエストで再試行される。
pub async fn shared_directory(
    cell: &'static SharedDirectory,
) -> Result<&'static UserDirectory<DynamoUserStore>, Response<Body>> {
    cell.get_or_try_init(build_directory).await.map_err(|e| {
        error!(error = %e, "UserDirectoryの初期化に失敗");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    })
}
