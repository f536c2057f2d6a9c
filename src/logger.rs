use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// 默认级别 info，可通过 RUST_LOG 环境变量覆盖。
/// 重复调用（例如多个测试各自初始化）时静默忽略。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
