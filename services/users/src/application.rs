// アプリケーション層モジュール
pub mod api_response;
pub mod create_user_handler;
pub mod get_user_handler;
pub mod lookup_user_handler;
pub mod user_directory;

// 再エクスポート
pub use api_response::{error_response, success_response};
pub use create_user_handler::CreateUserHandler;
pub use get_user_handler::GetUserHandler;
pub use lookup_user_handler::LookupUserHandler;
pub use user_directory::{UserDirectory, UserDirectoryError};
