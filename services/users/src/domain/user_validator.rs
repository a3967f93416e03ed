/// ユーザー作成入力のバリデーション
///
/// ハンドラー境界で実行する。UserDirectory自体は入力が検証済みであることを前提とする。
use thiserror::Error;

use super::user_record::CreateUserInput;

/// メールアドレスの最小文字数
pub const USER_EMAIL_MIN_LENGTH: usize = 5;
/// メールアドレスの最大文字数（RFC 5321）
pub const USER_EMAIL_MAX_LENGTH: usize = 254;
/// パスワードの最小文字数
pub const USER_PASSWORD_MIN_LENGTH: usize = 8;
/// パスワードの最大文字数
pub const USER_PASSWORD_MAX_LENGTH: usize = 128;
/// ユーザー名の最小文字数
pub const USER_USERNAME_MIN_LENGTH: usize = 3;
/// ユーザー名の最大文字数
pub const USER_USERNAME_MAX_LENGTH: usize = 30;

/// 入力バリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 必須フィールドのいずれかが空
    #[error("Email, password, and username are required")]
    MissingRequiredFields,
    /// 文字数が範囲外
    #[error("{field} must be between {min} and {max} characters")]
    InvalidLength {
        field: &'static str,
        min: usize,
        max: usize,
    },
    /// メールアドレスの形式が不正
    #[error("email must be a valid email address")]
    InvalidEmailFormat,
}

/// ユーザー作成入力のバリデータ
pub struct UserInputValidator;

impl UserInputValidator {
    /// 作成入力を検証
    ///
    /// チェック内容:
    /// - email / password / usernameが全て空でない
    /// - 各フィールドの文字数が範囲内（email, usernameは前後空白除去後）
    /// - emailが`local@domain`形式
    pub fn validate_create(input: &CreateUserInput) -> Result<(), ValidationError> {
        let email = input.email.trim();
        let username = input.username.trim();

        if email.is_empty() || input.password.is_empty() || username.is_empty() {
            return Err(ValidationError::MissingRequiredFields);
        }

        check_length("email", email, USER_EMAIL_MIN_LENGTH, USER_EMAIL_MAX_LENGTH)?;
        check_length(
            "password",
            &input.password,
            USER_PASSWORD_MIN_LENGTH,
            USER_PASSWORD_MAX_LENGTH,
        )?;
        check_length(
            "username",
            username,
            USER_USERNAME_MIN_LENGTH,
            USER_USERNAME_MAX_LENGTH,
        )?;

        if !Self::is_valid_email(email) {
            return Err(ValidationError::InvalidEmailFormat);
        }

        Ok(())
    }

    /// `@`がちょうど1つあり、その前後が空でなく、空白を含まない
    fn is_valid_email(email: &str) -> bool {
        if email.chars().any(char::is_whitespace) {
            return false;
        }
        match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            }
            None => false,
        }
    }
}

fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::InvalidLength { field, min, max });
    }
    Ok(())
}
