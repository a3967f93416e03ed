/// DynamoDBでユーザーレコードを管理するためのユーザーストア
///
/// テーブル構造:
/// - ユーザー行: パーティションキー`id`（UUID）、ソートキー`createdAt`
/// - 一意性ガード行: `id = EMAIL#{email}` / `id = USERNAME#{username}`、`createdAt = UNIQUE`
///
/// ガード行はemail / username属性を持たないため、セカンダリインデックスには現れない。
/// ユーザー行と2つのガード行は1つのトランザクションで条件付き書き込みされる。
use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem};
use thiserror::Error;
use tracing::debug;

use super::retry_policy::RetryableError;
use crate::domain::{AlternateKey, UserRecord};

/// emailセカンダリインデックス名
pub const EMAIL_INDEX_NAME: &str = "email-index";

/// usernameセカンダリインデックス名
pub const USERNAME_INDEX_NAME: &str = "username-index";

/// ガード行のソートキー値
const GUARD_SORT_KEY: &str = "UNIQUE";

/// 条件付き書き込み失敗を示すキャンセル理由コード
const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

/// 一時的な障害として再試行対象にするサービスエラーコード
const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalServerError",
    "ServiceUnavailable",
    "TransactionConflictException",
    "TransactionInProgressException",
];

/// 一時的な障害として再試行対象にするトランザクションキャンセル理由コード
///
/// キャンセル理由はサービスエラーとは別の名前体系（`...Exception`なし）を使う。
const TRANSIENT_CANCELLATION_CODES: &[&str] = &[
    "TransactionConflict",
    "ThrottlingError",
    "ProvisionedThroughputExceeded",
];

/// ユーザーストア操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserStoreError {
    /// 代替キーが既に使用されている（条件付き書き込み失敗）
    #[error("Unique key already taken: {0}")]
    UniqueKeyTaken(AlternateKey),

    /// 同一主キーのユーザー行が既に存在
    #[error("User id collision")]
    IdCollision,

    /// 一時的な障害（タイムアウト、スロットリング等）
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// DynamoDBへの書き込みに失敗
    #[error("Write error: {0}")]
    WriteError(String),

    /// DynamoDBからの読み取りに失敗
    #[error("Read error: {0}")]
    ReadError(String),

    /// リクエスト/レスポンスの変換に失敗
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl RetryableError for UserStoreError {
    /// IdCollisionは新しいIDでの再実行で解消するため再試行対象
    fn is_retryable(&self) -> bool {
        matches!(self, UserStoreError::Unavailable(_) | UserStoreError::IdCollision)
    }
}

/// ユーザー永続化用トレイト
///
/// 異なる実装を可能にする（実際のDynamoDB、テスト用モック）。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// ユーザー行と代替キーのガード行を原子的に書き込む
    ///
    /// 同じ`request_token`と同じレコードでの再送は、書き込み済みでも成功として扱われる
    /// （DynamoDBの`ClientRequestToken`による冪等性）。
    ///
    /// # 戻り値
    /// * 成功時は`Ok(())`
    /// * email / usernameが使用済みの場合は`Err(UserStoreError::UniqueKeyTaken)`
    /// * 同一主キーの行が存在する場合は`Err(UserStoreError::IdCollision)`
    async fn put_user(&self, record: &UserRecord, request_token: &str) -> Result<(), UserStoreError>;

    /// パーティションキー（id）で行を取得（挿入順、最大`limit`件）
    ///
    /// 欠落した属性は空文字列として返す。必須フィールドの検証は呼び出し元が行う。
    async fn query_by_id(&self, id: &str, limit: i32) -> Result<Vec<UserRecord>, UserStoreError>;

    /// 代替キーのセカンダリインデックスで行を取得（最大`limit`件）
    ///
    /// `value`は正規化済みであること。
    async fn query_by_index(
        &self,
        kind: AlternateKey,
        value: &str,
        limit: i32,
    ) -> Result<Vec<UserRecord>, UserStoreError>;
}

/// 代替キーに対応するセカンダリインデックス名
pub fn index_name(kind: AlternateKey) -> &'static str {
    match kind {
        AlternateKey::Email => EMAIL_INDEX_NAME,
        AlternateKey::Username => USERNAME_INDEX_NAME,
    }
}

/// ガード行のIDプレフィックス
fn guard_prefix(kind: AlternateKey) -> &'static str {
    match kind {
        AlternateKey::Email => "EMAIL#",
        AlternateKey::Username => "USERNAME#",
    }
}

/// ガード行のパーティションキー値を生成
/// フォーマット: EMAIL#{email} / USERNAME#{username}
pub fn guard_id(kind: AlternateKey, normalized_value: &str) -> String {
    format!("{}{}", guard_prefix(kind), normalized_value)
}

/// ガード行のIDか判定（ユーザーIDとして解決してはならない）
pub fn is_guard_id(id: &str) -> bool {
    AlternateKey::ALL
        .into_iter()
        .any(|kind| id.starts_with(guard_prefix(kind)))
}

/// UserStoreのDynamoDB実装
#[derive(Debug, Clone)]
pub struct DynamoUserStore {
    /// DynamoDBクライアント
    client: DynamoDbClient,
    /// ユーザーテーブル名
    table_name: String,
}

impl DynamoUserStore {
    /// 新しいDynamoUserStoreを作成
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    /// ユーザー行の属性マップを構築
    fn build_user_item(record: &UserRecord) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(record.id.clone()));
        item.insert(
            "createdAt".to_string(),
            AttributeValue::S(record.created_at.clone()),
        );
        item.insert("email".to_string(), AttributeValue::S(record.email.clone()));
        item.insert(
            "username".to_string(),
            AttributeValue::S(record.username.clone()),
        );
        item.insert(
            "password".to_string(),
            AttributeValue::S(record.password_credential.clone()),
        );
        item.insert(
            "updatedAt".to_string(),
            AttributeValue::S(record.updated_at.clone()),
        );
        item
    }

    /// ガード行の属性マップを構築
    fn build_guard_item(kind: AlternateKey, record: &UserRecord) -> HashMap<String, AttributeValue> {
        let value = match kind {
            AlternateKey::Email => &record.email,
            AlternateKey::Username => &record.username,
        };

        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(guard_id(kind, value)));
        item.insert(
            "createdAt".to_string(),
            AttributeValue::S(GUARD_SORT_KEY.to_string()),
        );
        item.insert("userId".to_string(), AttributeValue::S(record.id.clone()));
        item
    }

    /// 属性マップからレコードを復元（欠落属性は空文字列）
    fn parse_user_item(item: &HashMap<String, AttributeValue>) -> UserRecord {
        let string_attr = |name: &str| {
            item.get(name)
                .and_then(|v| v.as_s().ok())
                .cloned()
                .unwrap_or_default()
        };

        UserRecord {
            id: string_attr("id"),
            email: string_attr("email"),
            username: string_attr("username"),
            password_credential: string_attr("password"),
            created_at: string_attr("createdAt"),
            updated_at: string_attr("updatedAt"),
        }
    }

    /// 条件付き書き込み（attribute_not_exists(id)）のPutを構築
    fn conditional_put(&self, item: HashMap<String, AttributeValue>) -> Result<TransactWriteItem, UserStoreError> {
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(|e| UserStoreError::SerializationError(e.to_string()))?;

        Ok(TransactWriteItem::builder().put(put).build())
    }

    /// トランザクションのキャンセル理由をエラーに変換
    ///
    /// `codes`はトランザクション項目と同じ順序:
    /// [ユーザー行, emailガード, usernameガード]
    /// 代替キーの衝突をIDの衝突より優先して報告する。
    fn conflict_from_cancellation(codes: &[Option<&str>]) -> Option<UserStoreError> {
        let failed = |index: usize| {
            codes
                .get(index)
                .copied()
                .flatten()
                .is_some_and(|code| code == CONDITIONAL_CHECK_FAILED)
        };

        for (offset, kind) in AlternateKey::ALL.into_iter().enumerate() {
            if failed(offset + 1) {
                return Some(UserStoreError::UniqueKeyTaken(kind));
            }
        }
        if failed(0) {
            return Some(UserStoreError::IdCollision);
        }

        let conflicted = codes
            .iter()
            .flatten()
            .any(|code| TRANSIENT_CANCELLATION_CODES.contains(code));
        if conflicted {
            return Some(UserStoreError::Unavailable(
                "Transaction cancelled by a conflicting request".to_string(),
            ));
        }

        None
    }
}

/// SDKエラーを一時的障害とそれ以外に分類
fn classify_sdk_error<E, R>(err: SdkError<E, R>, otherwise: fn(String) -> UserStoreError) -> UserStoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => true,
        SdkError::ServiceError(_) => err
            .code()
            .is_some_and(|code| TRANSIENT_ERROR_CODES.contains(&code)),
        _ => false,
    };

    let message = DisplayErrorContext(&err).to_string();
    if transient {
        UserStoreError::Unavailable(message)
    } else {
        otherwise(message)
    }
}

#[async_trait]
impl UserStore for DynamoUserStore {
    async fn put_user(&self, record: &UserRecord, request_token: &str) -> Result<(), UserStoreError> {
        let mut request = self
            .client
            .transact_write_items()
            .client_request_token(request_token)
            .transact_items(self.conditional_put(Self::build_user_item(record))?);

        for kind in AlternateKey::ALL {
            request = request.transact_items(self.conditional_put(Self::build_guard_item(kind, record))?);
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                if let SdkError::ServiceError(service_err) = &err
                    && let TransactWriteItemsError::TransactionCanceledException(cancelled) =
                        service_err.err()
                {
                    let codes: Vec<Option<&str>> = cancelled
                        .cancellation_reasons()
                        .iter()
                        .map(|reason| reason.code())
                        .collect();

                    debug!(user_id = %record.id, reasons = ?codes, "トランザクションキャンセル");

                    if let Some(conflict) = Self::conflict_from_cancellation(&codes) {
                        return Err(conflict);
                    }
                }
                Err(classify_sdk_error(err, UserStoreError::WriteError))
            }
        }
    }

    async fn query_by_id(&self, id: &str, limit: i32) -> Result<Vec<UserRecord>, UserStoreError> {
        // ソートキー（createdAt）が不明なため、パーティションキーのみで範囲検索する
        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("id = :id")
            .expression_attribute_values(":id", AttributeValue::S(id.to_string()))
            .limit(limit)
            .send()
            .await
            .map_err(|e| classify_sdk_error(e, UserStoreError::ReadError))?;

        Ok(result
            .items
            .unwrap_or_default()
            .iter()
            .map(Self::parse_user_item)
            .collect())
    }

    async fn query_by_index(
        &self,
        kind: AlternateKey,
        value: &str,
        limit: i32,
    ) -> Result<Vec<UserRecord>, UserStoreError> {
        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(index_name(kind))
            .key_condition_expression("#key = :value")
            .expression_attribute_names("#key", kind.attribute_name())
            .expression_attribute_values(":value", AttributeValue::S(value.to_string()))
            .limit(limit)
            .send()
            .await
            .map_err(|e| classify_sdk_error(e, UserStoreError::ReadError))?;

        Ok(result
            .items
            .unwrap_or_default()
            .iter()
            .map(Self::parse_user_item)
            .collect())
    }
}
