use anyhow::Result;
use ictu_score_viewer::app::App;
use ictu_score_viewer::config::Config;
use ictu_score_viewer::logger;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    // 加载配置
    let config = Config::load().await?;

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
