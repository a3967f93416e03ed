/// DynamoDB接続設定
use aws_sdk_dynamodb::Client as DynamoDbClient;
use thiserror::Error;

/// ユーザーテーブル名を指定する環境変数
pub const ENV_USER_TABLE_NAME: &str = "USER_TABLE_NAME";

/// DynamoDB設定のエラー型
#[derive(Debug, Error)]
pub enum DynamoDbConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// テーブル名とクライアントを持つDynamoDB設定
///
/// テーブル名は環境変数`USER_TABLE_NAME`で設定する。
/// AWS認証情報とリージョンはaws-configのデフォルトチェーンから読み込まれる。
#[derive(Debug, Clone)]
pub struct DynamoDbConfig {
    /// DynamoDBクライアントインスタンス
    client: DynamoDbClient,
    /// ユーザーテーブル名
    users_table: String,
}

impl DynamoDbConfig {
    /// 環境からAWS設定とテーブル名を読み込んでDynamoDbConfigを作成
    pub async fn from_env() -> Result<Self, DynamoDbConfigError> {
        // テーブル名を先に検証し、欠落時はAWS設定の読み込みを省略する
        let users_table = users_table_from_env()?;

        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = DynamoDbClient::new(&aws_config);

        Ok(Self {
            client,
            users_table,
        })
    }

    /// 明示的な値で新しいDynamoDbConfigを作成（テスト用）
    pub fn new(client: DynamoDbClient, users_table: String) -> Self {
        Self {
            client,
            users_table,
        }
    }

    /// DynamoDBクライアントへの参照を取得
    pub fn client(&self) -> &DynamoDbClient {
        &self.client
    }

    /// ユーザーテーブル名を取得
    pub fn users_table(&self) -> &str {
        &self.users_table
    }
}

/// 環境変数からユーザーテーブル名を読み込む（空文字列は未設定扱い）
fn users_table_from_env() -> Result<String, DynamoDbConfigError> {
    std::env::var(ENV_USER_TABLE_NAME)
        .ok()
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| DynamoDbConfigError::MissingEnvVar(ENV_USER_TABLE_NAME.to_string()))
}
