//! LLM configuration for the Vertex AI Gemini endpoint

use std::time::Duration;

/// Harm categories sent with every request
pub const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_HARASSMENT",
];

/// Configuration for the hosted LLM
#[derive(Clone, Debug)]
pub struct LLMConfig {
    /// Google Cloud project id
    pub project: String,

    /// Vertex AI region, e.g. `us-central1`
    pub location: String,

    /// Publisher model id
    pub model_id: String,

    /// Temperature for sampling
    pub temperature: f32,

    /// Top-p (nucleus) sampling parameter
    pub top_p: f32,

    /// Maximum tokens to generate per response
    pub max_output_tokens: u32,

    /// Block threshold applied to every safety category
    pub safety_threshold: String,

    /// Base URL override; defaults to the regional aiplatform host
    pub endpoint: Option<String>,

    /// OAuth bearer token
    pub access_token: Option<String>,

    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            location: String::new(),
            model_id: "gemini-2.0-flash-001".to_string(),
            temperature: 1.0,
            top_p: 0.95,
            max_output_tokens: 8192,
            safety_threshold: "BLOCK_NONE".to_string(),
            endpoint: None,
            access_token: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl LLMConfig {
    /// Create a configuration for the given project and region
    pub fn new(project: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
            ..Default::default()
        }
    }

    /// Set the model id
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set maximum output tokens
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Point requests at a different host (proxies, local fakes)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }

    /// Full URL of the streaming generation call
    pub fn stream_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:streamGenerateContent?alt=sse",
            self.base_url(),
            self.project,
            self.location,
            self.model_id
        )
    }
}
