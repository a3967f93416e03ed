// ユーザーレコード
//
// ユーザーの内部表現（認証情報を含む）と外部公開用の射影を定義する。
// 外部へ返却するユーザー表現は必ず`project_public`を経由する。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 保存済みレコードの必須フィールド欠落エラー
///
/// ストアの破損や部分書き込みを示す。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("User record is missing required field: {field}")]
pub struct MalformedRecordError {
    /// 欠落しているフィールド名
    pub field: &'static str,
}

/// ユーザーレコード（内部表現）
///
/// パスワード認証情報を含むため`Serialize`は実装しない。
/// 外部へ返す場合は[`project_public`]で[`PublicUserRecord`]に変換すること。
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// ユーザーID（UUID v4）
    pub id: String,
    /// 正規化済みメールアドレス
    pub email: String,
    /// 正規化済みユーザー名
    pub username: String,
    /// パスワード認証情報（不透明な秘密文字列）
    pub password_credential: String,
    /// 作成日時（ISO-8601）
    pub created_at: String,
    /// 更新日時（ISO-8601）
    pub updated_at: String,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

impl UserRecord {
    /// 認証情報を含む全必須フィールドの存在を検証
    ///
    /// ストアから読み出した行をレコードとして扱う前に使用する。
    pub fn validate_full(&self) -> Result<(), MalformedRecordError> {
        self.validate_public_fields()?;
        require("password", &self.password_credential)
    }

    fn validate_public_fields(&self) -> Result<(), MalformedRecordError> {
        require("id", &self.id)?;
        require("email", &self.email)?;
        require("username", &self.username)?;
        require("createdAt", &self.created_at)?;
        require("updatedAt", &self.updated_at)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), MalformedRecordError> {
    if value.is_empty() {
        return Err(MalformedRecordError { field });
    }
    Ok(())
}

/// 外部公開用ユーザーレコード（認証情報を除外）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUserRecord {
    pub id: String,
    pub email: String,
    pub username: String,
    pub created_at: String,
    pub updated_at: String,
}

/// レコードを外部公開用に射影
///
/// 必須フィールドが空の場合は`MalformedRecordError`を返す。
/// パスワード認証情報は常に除外される。
pub fn project_public(record: &UserRecord) -> Result<PublicUserRecord, MalformedRecordError> {
    record.validate_public_fields()?;

    Ok(PublicUserRecord {
        id: record.id.clone(),
        email: record.email.clone(),
        username: record.username.clone(),
        created_at: record.created_at.clone(),
        updated_at: record.updated_at.clone(),
    })
}

/// ユーザー作成入力
///
/// 欠落したフィールドは空文字列として扱い、必須チェックはハンドラー境界で行う。
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CreateUserInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
}

impl fmt::Debug for CreateUserInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateUserInput")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl CreateUserInput {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            username: username.into(),
        }
    }
}

/// ユーザー更新入力（全フィールド任意）
///
/// 更新ハンドラーは未提供。レコードへの適用規則のみ定義する。
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateUserInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl UpdateUserInput {
    /// 変更対象のフィールドが一つもないか
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none() && self.username.is_none()
    }

    /// 更新をレコードに適用した新しいレコードを返す
    ///
    /// email / usernameは正規化され、`updated_at`のみ時刻が進む。
    pub fn apply_to(&self, record: &UserRecord, now: &str) -> UserRecord {
        let mut updated = record.clone();
        if let Some(email) = &self.email {
            updated.email = super::AlternateKey::normalize(email);
        }
        if let Some(username) = &self.username {
            updated.username = super::AlternateKey::normalize(username);
        }
        if let Some(password) = &self.password {
            updated.password_credential = password.clone();
        }
        if !self.is_empty() {
            updated.updated_at = now.to_string();
        }
        updated
    }
}
