//! Response generation over any OpenAI-compatible `/v1/chat/completions`
//! endpoint. The system prompt sets the topic.

use crate::providers::accept;
use crate::stage::{ProviderError, ResponseGenerator};
use reqwest::blocking::Client;
use serde_json::{Value, json};

pub struct ChatCompletionsGenerator {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    system_prompt: String,
}

impl ChatCompletionsGenerator {
    pub fn new(
        client: Client,
        base_url: &str,
        api_key: Option<&str>,
        model: &str,
        system_prompt: &str,
    ) -> Self {
        Self {
            client,
            url: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
        }
    }

    fn body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": prompt }
            ],
            "stream": false
        })
    }
}

fn parse_completion(body: &Value) -> Result<String, ProviderError> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| ProviderError::Decode("no completion content".to_string()))?
        .trim();
    if content.is_empty() {
        return Err(ProviderError::Decode("empty completion".to_string()));
    }
    Ok(content.to_string())
}

impl ResponseGenerator for ChatCompletionsGenerator {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut request = self.client.post(&self.url).json(&self.body(prompt));
        // Local servers such as Ollama need no key.
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let body: Value = accept(request.send()?, &[200])?.json()?;
        parse_completion(&body)
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}
