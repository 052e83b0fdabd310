use super::{Config, Secret};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_components();
        self.apply_env_overrides_server();

        if let Ok(v) = std::env::var("PAPYRUS_OPENAI_API_KEY")
            && !v.trim().is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("PAPYRUS_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid PAPYRUS_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("PAPYRUS_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = n;
        }
    }

    fn apply_env_overrides_components(&mut self) {
        if let Ok(v) = std::env::var("PAPYRUS_PAPERS_BASE_URL") {
            self.papers.base_url = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_PAPERS_MAX_RESULTS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.papers.default_max_results = n;
        }
        if let Ok(v) = std::env::var("PAPYRUS_PAPERS_CACHE_TTL")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.papers.cache_ttl_secs = secs;
        }
        if let Ok(v) = std::env::var("PAPYRUS_PAPERS_FETCH_FULL_TEXT")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.papers.fetch_full_text = enabled;
        }
        if let Ok(v) = std::env::var("PAPYRUS_STORE_BACKEND") {
            if let Ok(backend) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.store.backend = backend;
            } else {
                tracing::warn!("ignoring invalid PAPYRUS_STORE_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("PAPYRUS_SQLITE_PATH") {
            self.store.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_STORE_COLLECTION") {
            self.store.collection = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_RAG_TOP_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.rag.top_k = k;
        }
        if let Ok(v) = std::env::var("PAPYRUS_CITATION_USE_LLM")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.citation.use_llm = enabled;
        }
        if let Ok(v) = std::env::var("PAPYRUS_PROMPTS_DIR") {
            self.prompts.dir = Some(v);
        }
    }

    fn apply_env_overrides_server(&mut self) {
        if let Ok(v) = std::env::var("PAPYRUS_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("PAPYRUS_GATEWAY_RATE_LIMIT")
            && let Ok(limit) = v.parse::<u32>()
        {
            self.gateway.rate_limit = limit;
        }
        if let Ok(v) = std::env::var("PAPYRUS_GATEWAY_MAX_BODY_SIZE")
            && let Ok(size) = v.parse::<usize>()
        {
            self.gateway.max_body_size = size;
        }
        if let Ok(v) = std::env::var("PAPYRUS_TIMEOUT_REQUEST")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.request_seconds = secs;
        }
        if let Ok(v) = std::env::var("PAPYRUS_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("PAPYRUS_LOG_FORMAT") {
            if let Ok(format) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.logging.format = format;
            } else {
                tracing::warn!("ignoring invalid PAPYRUS_LOG_FORMAT value: {v}");
            }
        }
    }
}
