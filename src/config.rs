/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP 服务监听地址
    pub server_host: String,
    /// HTTP 服务监听端口
    pub server_port: u16,
    /// 浏览器调试端口（CDP）
    pub browser_debug_port: u16,
    /// 附加失败时是否允许启动新的浏览器实例
    pub launch_fallback: bool,
    /// 指令队列容量
    pub command_queue_capacity: usize,
    /// 普通指令的整体等待截止时间（秒）
    pub command_timeout_secs: u64,
    /// 元素级指令的整体等待截止时间（秒）
    pub element_timeout_secs: u64,
    /// 监督者等待引擎就绪的上限（秒）
    pub startup_timeout_secs: u64,
    /// 引擎初始化重试次数
    pub engine_init_attempts: usize,
    /// 引擎初始化重试间隔（秒）
    pub engine_init_backoff_secs: u64,
    /// 导航重试次数
    pub navigation_attempts: usize,
    /// 导航成功后的基础加载等待（秒），按尝试次数递增
    pub navigation_settle_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 搜索 API 配置 ---
    pub search_api_key: String,
    pub search_api_base_url: String,
    // --- 评分配置 ---
    /// 投资人入选阈值
    pub investor_threshold: f64,
    /// 引擎降级导致档案截断时的保底置信度（待定策略开关）
    pub fallback_confidence: f64,
    /// 创业公司信息 TOML 文件
    pub startup_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 5500,
            browser_debug_port: 9222,
            launch_fallback: true,
            command_queue_capacity: 64,
            command_timeout_secs: 10,
            element_timeout_secs: 5,
            startup_timeout_secs: 30,
            engine_init_attempts: 3,
            engine_init_backoff_secs: 2,
            navigation_attempts: 3,
            navigation_settle_secs: 3,
            verbose_logging: false,
            output_log_file: "seed_pitcher.log".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            search_api_key: String::new(),
            search_api_base_url: "https://api.tavily.com".to_string(),
            investor_threshold: 0.5,
            fallback_confidence: 0.6,
            startup_file: "startup.toml".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or(default.server_host),
            server_port: std::env::var("SERVER_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.server_port),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            launch_fallback: std::env::var("LAUNCH_FALLBACK").ok().and_then(|v| v.parse().ok()).unwrap_or(default.launch_fallback),
            command_queue_capacity: std::env::var("COMMAND_QUEUE_CAPACITY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.command_queue_capacity),
            command_timeout_secs: std::env::var("COMMAND_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.command_timeout_secs),
            element_timeout_secs: std::env::var("ELEMENT_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.element_timeout_secs),
            startup_timeout_secs: std::env::var("STARTUP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.startup_timeout_secs),
            engine_init_attempts: std::env::var("ENGINE_INIT_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.engine_init_attempts),
            engine_init_backoff_secs: std::env::var("ENGINE_INIT_BACKOFF_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.engine_init_backoff_secs),
            navigation_attempts: std::env::var("NAVIGATION_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.navigation_attempts),
            navigation_settle_secs: std::env::var("NAVIGATION_SETTLE_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.navigation_settle_secs),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            search_api_key: std::env::var("SEARCH_API_KEY").unwrap_or(default.search_api_key),
            search_api_base_url: std::env::var("SEARCH_API_BASE_URL").unwrap_or(default.search_api_base_url),
            investor_threshold: std::env::var("INVESTOR_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.investor_threshold),
            fallback_confidence: std::env::var("FALLBACK_CONFIDENCE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.fallback_confidence),
            startup_file: std::env::var("STARTUP_FILE").unwrap_or(default.startup_file),
        }
    }
}
