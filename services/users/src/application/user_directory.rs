/// ユーザーディレクトリ
///
/// ユーザーレコードの作成と検索を提供し、email / usernameの一意性を保証する。
///
/// 「見つからない」は例外ではなく通常の結果として`Ok(None)`で表現する。
/// id検索・代替キー検索のどちらも同じ扱いとし、404への変換はハンドラーが行う。
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    project_public, AlternateKey, CreateUserInput, MalformedRecordError, PublicUserRecord,
    UserRecord,
};
use crate::infrastructure::user_repository::is_guard_id;
use crate::infrastructure::{RetryPolicy, UserStore, UserStoreError};

/// ユーザーディレクトリ操作のエラー型
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserDirectoryError {
    /// 代替キーの一意性違反（再試行しない）
    #[error("user with this {0} already exists")]
    DuplicateKey(AlternateKey),

    /// 保存済みレコードの必須フィールド欠落（再試行しない）
    #[error("malformed user record: missing {0}")]
    MalformedRecord(String),

    /// 一時的な障害が再試行上限まで続いた
    #[error("user store unavailable: {0}")]
    StoreUnavailable(String),

    /// その他のストア障害
    #[error("user store error: {0}")]
    Store(String),
}

impl From<UserStoreError> for UserDirectoryError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::UniqueKeyTaken(kind) => UserDirectoryError::DuplicateKey(kind),
            UserStoreError::IdCollision => {
                UserDirectoryError::StoreUnavailable("user id collision".to_string())
            }
            UserStoreError::Unavailable(msg) => UserDirectoryError::StoreUnavailable(msg),
            UserStoreError::WriteError(msg)
            | UserStoreError::ReadError(msg)
            | UserStoreError::SerializationError(msg) => UserDirectoryError::Store(msg),
        }
    }
}

impl From<MalformedRecordError> for UserDirectoryError {
    fn from(err: MalformedRecordError) -> Self {
        UserDirectoryError::MalformedRecord(err.field.to_string())
    }
}

/// ユーザーディレクトリ
///
/// ストアは依存性注入で受け取る（本番はDynamoUserStore、テストはモック）。
pub struct UserDirectory<S>
where
    S: UserStore,
{
    /// ユーザーストア
    store: S,
    /// 一時的障害の再試行ポリシー
    retry_policy: RetryPolicy,
}

impl<S> UserDirectory<S>
where
    S: UserStore,
{
    /// デフォルトの再試行ポリシーで作成
    pub fn new(store: S) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    /// 再試行ポリシーを指定して作成
    pub fn with_retry_policy(store: S, retry_policy: RetryPolicy) -> Self {
        Self {
            store,
            retry_policy,
        }
    }

    /// ユーザーを作成
    ///
    /// # 処理フロー
    /// 1. email / usernameを正規化
    /// 2. 代替キーの事前チェック（既存ユーザーがいれば即座にDuplicateKey）
    /// 3. 新しいIDと共通タイムスタンプでレコードを1度だけ構築
    /// 4. ユーザー行とガード行を条件付きで原子的に書き込む
    ///
    /// 事前チェックは早期の失敗のためだけに行う。一意性は4の条件付き書き込みで保証され、
    /// 同時作成の競合に負けた側もDuplicateKeyになる。
    ///
    /// 一時的障害の再試行では同じレコードとリクエストトークンを再送する。
    /// 書き込みが確定した後に応答だけが失われても、再送は冪等に成功する。
    /// IDとトークンを作り直すのはIdCollisionの後だけ。
    ///
    /// 入力の必須チェック・文字数チェックは呼び出し元で済んでいること。
    pub async fn create(&self, input: &CreateUserInput) -> Result<UserRecord, UserDirectoryError> {
        let email = AlternateKey::normalize(&input.email);
        let username = AlternateKey::normalize(&input.username);

        for (kind, value) in [(AlternateKey::Email, &email), (AlternateKey::Username, &username)] {
            if self.find_by_alternate_key(kind, value).await?.is_some() {
                warn!(kind = %kind, "代替キーが既に使用されている");
                return Err(UserDirectoryError::DuplicateKey(kind));
            }
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut pending = UserRecord {
            id: Uuid::new_v4().to_string(),
            email,
            username,
            password_credential: input.password.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        let mut request_token = Uuid::new_v4().to_string();
        let id_collided = AtomicBool::new(false);
        let id_collided = &id_collided;
        let store = &self.store;

        let record = self
            .retry_policy
            .run("put_user", |_attempt| {
                if id_collided.swap(false, Ordering::SeqCst) {
                    pending.id = Uuid::new_v4().to_string();
                    request_token = Uuid::new_v4().to_string();
                }
                let record = pending.clone();
                let token = request_token.clone();
                async move {
                    match store.put_user(&record, &token).await {
                        Ok(()) => Ok(record),
                        Err(UserStoreError::IdCollision) => {
                            id_collided.store(true, Ordering::SeqCst);
                            Err(UserStoreError::IdCollision)
                        }
                        Err(err) => Err(err),
                    }
                }
            })
            .await
            .map_err(|err| {
                match &err {
                    UserStoreError::UniqueKeyTaken(kind) => {
                        warn!(kind = %kind, "同時作成の競合により一意性違反");
                    }
                    other => error!(error = %other, "ユーザー書き込み失敗"),
                }
                UserDirectoryError::from(err)
            })?;

        info!(user_id = %record.id, "ユーザー作成完了");
        Ok(record)
    }

    /// IDでユーザーを取得
    ///
    /// 主キーはid + createdAtの複合キーだが、呼び出し元はcreatedAtを知らないため
    /// idのパーティション内を範囲検索し、先頭の1件を返す。
    /// ガード行のID（`EMAIL#...`等）はユーザーIDではないため検索せずに`None`を返す。
    pub async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, UserDirectoryError> {
        let id = id.trim();
        if id.is_empty() || is_guard_id(id) {
            return Ok(None);
        }

        let rows = self
            .retry_policy
            .run("query_by_id", |_| self.store.query_by_id(id, 1))
            .await
            .map_err(|err| {
                error!(user_id = id, error = %err, "ID検索失敗");
                UserDirectoryError::from(err)
            })?;

        Self::first_valid(rows)
    }

    /// 代替キー（email / username）でユーザーを取得
    ///
    /// 値は正規化してからセカンダリインデックスで検索する。
    pub async fn find_by_alternate_key(
        &self,
        kind: AlternateKey,
        value: &str,
    ) -> Result<Option<UserRecord>, UserDirectoryError> {
        let normalized = AlternateKey::normalize(value);
        if normalized.is_empty() {
            return Ok(None);
        }

        let rows = self
            .retry_policy
            .run("query_by_index", |_| {
                self.store.query_by_index(kind, &normalized, 1)
            })
            .await
            .map_err(|err| {
                error!(kind = %kind, error = %err, "代替キー検索失敗");
                UserDirectoryError::from(err)
            })?;

        Self::first_valid(rows)
    }

    /// レコードを外部公開用に射影
    pub fn project_public(&self, record: &UserRecord) -> Result<PublicUserRecord, UserDirectoryError> {
        project_public(record).map_err(|err| {
            error!(user_id = %record.id, field = err.field, "不完全なユーザーレコード");
            UserDirectoryError::from(err)
        })
    }

    /// 先頭の行を必須フィールド検証した上で返す
    fn first_valid(rows: Vec<UserRecord>) -> Result<Option<UserRecord>, UserDirectoryError> {
        match rows.into_iter().next() {
            Some(record) => {
                record.validate_full().map_err(|err| {
                    error!(user_id = %record.id, field = err.field, "不完全なユーザー行");
                    UserDirectoryError::from(err)
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}
