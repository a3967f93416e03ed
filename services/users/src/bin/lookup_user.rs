/// 代替キー検索 HTTP Lambdaエントリポイント
///
/// API Gateway経由の GET /users/lookup リクエストを処理する。
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use tokio::sync::OnceCell;
use tracing::info;
use users::application::LookupUserHandler;
use users::{shared_directory, SharedDirectory};
use users::infrastructure::init_logging;

/// UserDirectoryの静的インスタンス
static DIRECTORY: SharedDirectory = OnceCell::const_new();

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logging();

    info!("代替キー検索 Lambda関数を初期化");

    run(service_fn(handler)).await
}

async fn handler(request: Request) -> Result<Response<Body>, Error> {
    info!(method = %request.method(), path = request.uri().path(), "代替キー検索リクエスト受信");

    let directory = match shared_directory(&DIRECTORY).await {
        Ok(directory) => directory,
        Err(response) => return Ok(response),
    };

    let response = LookupUserHandler::new(directory).handle(&request).await;

    info!(status = response.status().as_u16(), "代替キー検索レスポンス送信");

    Ok(response)
}
