// 代替キー
//
// ユーザーを主キー（id）以外で一意に特定するための属性（email / username）と、
// その正規化ルールを定義するドメイン層コンポーネント。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 代替キーの種別
///
/// どちらもテーブル全体で一意であり、セカンダリインデックス経由でのみ参照される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlternateKey {
    /// メールアドレス
    Email,
    /// ユーザー名
    Username,
}

impl AlternateKey {
    /// 全ての代替キー（一意性ガードの書き込み順序でもある）
    pub const ALL: [AlternateKey; 2] = [AlternateKey::Email, AlternateKey::Username];

    /// 属性名（レコードのフィールド名、クエリパラメータ名と一致）
    pub fn attribute_name(&self) -> &'static str {
        match self {
            AlternateKey::Email => "email",
            AlternateKey::Username => "username",
        }
    }

    /// 比較・保存前の正規化
    ///
    /// 前後の空白を除去し、小文字に変換する。
    pub fn normalize(value: &str) -> String {
        value.trim().to_lowercase()
    }
}

impl fmt::Display for AlternateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_name())
    }
}
