use std::env;

#[derive(Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub gemini_api_key: String,
    pub gemini_endpoint: String,
    pub gemini_model: String,
    /// Deadline for the outbound generateContent call, in seconds.
    pub chat_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let chat_timeout_secs = env::var("CHAT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        Self {
            mongo_uri: env::var("MONGO_URI").expect("MONGO_URI must be set"),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "taskpilot".to_string()),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            gemini_api_key: env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set"),
            gemini_endpoint: env::var("GEMINI_ENDPOINT").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            gemini_model: env::var("GEMINI_MODEL_ID")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            chat_timeout_secs,
        }
    }
}
