use env_logger::Env;

/// 預設只顯示警告，避免與進度條交錯；可用 `RUST_LOG` 覆寫
pub const DEFAULT_LOG_FILTER: &str = "warn";

pub fn init() {
    init_with_filter(DEFAULT_LOG_FILTER);
}

/// 重複初始化時忽略（例如測試中多次呼叫）
pub fn init_with_filter(default_filter: &str) {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .try_init();
}
