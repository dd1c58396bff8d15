use std::env;
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "gemma:2b";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const CLI_TIMEOUT: Duration = Duration::from_secs(60);
const OPENAI_MAX_TOKENS: u32 = 1000;

/// Outcome of a single backend attempt. `Skipped` means the backend was not
/// tried at all (missing credential), which the dispatcher does not count as
/// a failure worth warning about.
#[derive(Debug, Clone)]
pub enum Attempt {
    Success(String),
    Skipped(String),
    Unavailable(String),
}

pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn attempt(&self, prompt: &str) -> Attempt;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated {
        text: String,
        backend: &'static str,
    },
    /// Every backend was skipped or unavailable. Non-fatal: the caller
    /// renders an explanatory message instead of a generated answer.
    NoBackend,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub ollama_url: String,
    pub ollama_model: String,
    pub openai_model: String,
    pub openai_api_key: Option<String>,
}

impl GenerationConfig {
    pub fn from_env() -> Self {
        Self {
            ollama_url: env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string()),
            ollama_model: env::var("OLLAMA_MODEL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.to_string()),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|key| !key.is_empty()),
        }
    }
}

/// Tries backends in a fixed priority order and stops at the first usable
/// completion. All per-attempt failures are absorbed here; nothing a backend
/// does propagates as an error to the caller.
pub struct Dispatcher {
    backends: Vec<Box<dyn GenerationBackend>>,
}

impl Dispatcher {
    pub fn new(backends: Vec<Box<dyn GenerationBackend>>) -> Self {
        Self { backends }
    }

    /// Standard order: local Ollama first, OpenAI second.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let ollama = OllamaBackend::new(&config.ollama_url, &config.ollama_model)?;
        let openai = OpenAiBackend::new(
            config.openai_api_key.clone(),
            &config.openai_model,
            OPENAI_MAX_TOKENS,
        )?;
        Ok(Self::new(vec![Box::new(ollama), Box::new(openai)]))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(&GenerationConfig::from_env())
    }

    pub fn dispatch(&self, prompt: &str) -> GenerationOutcome {
        for backend in &self.backends {
            match backend.attempt(prompt) {
                Attempt::Success(text) => {
                    info!(backend = backend.name(), chars = text.len(), "generation succeeded");
                    return GenerationOutcome::Generated {
                        text,
                        backend: backend.name(),
                    };
                }
                Attempt::Skipped(reason) => {
                    debug!(backend = backend.name(), %reason, "backend skipped");
                }
                Attempt::Unavailable(reason) => {
                    warn!(backend = backend.name(), %reason, "backend unavailable");
                }
            }
        }
        GenerationOutcome::NoBackend
    }
}

/// Local Ollama backend. The HTTP API is tried first; on any transport error
/// or non-success status the `ollama` CLI is invoked with the prompt on
/// stdin. Only when both transports come up empty is the backend reported
/// unavailable.
pub struct OllamaBackend {
    http: Client,
    base_url: String,
    model: String,
    cli_timeout: Duration,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            cli_timeout: CLI_TIMEOUT,
        })
    }

    fn generate_http(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .with_context(|| format!("ollama request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("ollama returned status {status}: {body}"));
        }
        let body = response.text().context("failed to read ollama body")?;
        parse_ollama_body(&body)
    }

    fn generate_cli(&self, prompt: &str) -> Result<String> {
        let output = run_with_deadline(
            "ollama",
            &["run", &self.model],
            prompt,
            self.cli_timeout,
        )?;
        if !output.stdout.trim().is_empty() {
            return Ok(output.stdout);
        }
        // Best effort: surface the diagnostic text rather than nothing.
        if !output.stderr.trim().is_empty() {
            return Ok(output.stderr);
        }
        Err(anyhow!("ollama CLI produced no output"))
    }
}

impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn attempt(&self, prompt: &str) -> Attempt {
        let http_err = match self.generate_http(prompt) {
            // An empty completion with HTTP 200 is still a completion.
            Ok(text) => return Attempt::Success(text),
            Err(err) => err,
        };
        debug!(error = %http_err, "ollama API failed, trying CLI");
        match self.generate_cli(prompt) {
            Ok(text) => Attempt::Success(text),
            Err(cli_err) => Attempt::Unavailable(format!("api: {http_err}; cli: {cli_err}")),
        }
    }
}

fn parse_ollama_body(body: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct GenerateResponse {
        #[serde(default)]
        response: String,
    }
    let parsed: GenerateResponse =
        serde_json::from_str(body).context("failed to decode ollama response")?;
    Ok(parsed.response)
}

#[derive(Debug)]
struct CommandOutput {
    stdout: String,
    stderr: String,
}

/// Run a child process with the given stdin, killing it if it outlives the
/// deadline. Stdout and stderr are drained on their own threads so a chatty
/// child cannot deadlock on a full pipe.
fn run_with_deadline(
    program: &str,
    args: &[&str],
    input: &str,
    deadline: Duration,
) -> Result<CommandOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("missing child stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("missing child stderr"))?;
    let stdout_reader = thread::spawn(move || read_to_string_lossy(stdout));
    let stderr_reader = thread::spawn(move || read_to_string_lossy(stderr));
    {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("missing child stdin"))?;
        // The child may exit before reading everything; a broken pipe here
        // is not an error worth surfacing.
        let _ = stdin.write_all(input.as_bytes());
    }
    let started = Instant::now();
    loop {
        if child.try_wait()?.is_some() {
            break;
        }
        if started.elapsed() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("{program} timed out after {deadline:?}"));
        }
        thread::sleep(Duration::from_millis(50));
    }
    Ok(CommandOutput {
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
    })
}

fn read_to_string_lossy(mut source: impl std::io::Read) -> String {
    let mut buf = Vec::new();
    let _ = source.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Remote OpenAI chat backend. Without a configured API key the backend is
/// skipped, which the dispatcher treats as "not attempted" rather than a
/// failure.
pub struct OpenAiBackend {
    http: Client,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl OpenAiBackend {
    pub fn new(api_key: Option<String>, model: &str, max_tokens: u32) -> Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            max_tokens,
        })
    }

    fn generate(&self, api_key: &str, prompt: &str) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [ { "role": "user", "content": prompt } ],
            "max_tokens": self.max_tokens,
        });
        let response = self
            .http
            .post(OPENAI_CHAT_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .context("openai request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("openai returned status {status}: {body}"));
        }
        let body = response.text().context("failed to read openai body")?;
        parse_chat_body(&body)
    }
}

impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn attempt(&self, prompt: &str) -> Attempt {
        let Some(api_key) = self.api_key.as_deref() else {
            return Attempt::Skipped("OPENAI_API_KEY is not set".to_string());
        };
        match self.generate(api_key, prompt) {
            Ok(text) => Attempt::Success(text),
            Err(err) => Attempt::Unavailable(err.to_string()),
        }
    }
}

fn parse_chat_body(body: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<ChatChoice>,
    }
    #[derive(Deserialize)]
    struct ChatChoice {
        message: ChatMessage,
    }
    #[derive(Deserialize)]
    struct ChatMessage {
        content: String,
    }
    let parsed: ChatResponse =
        serde_json::from_str(body).context("failed to decode openai response")?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("missing choices in openai response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend {
        name: &'static str,
        result: Attempt,
    }

    impl GenerationBackend for FixedBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        fn attempt(&self, _prompt: &str) -> Attempt {
            self.result.clone()
        }
    }

    fn fixed(name: &'static str, result: Attempt) -> Box<dyn GenerationBackend> {
        Box::new(FixedBackend { name, result })
    }

    struct MustNotBeCalled;

    impl GenerationBackend for MustNotBeCalled {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        fn attempt(&self, _prompt: &str) -> Attempt {
            panic!("secondary backend must not be invoked after a primary success");
        }
    }

    #[test]
    fn first_success_short_circuits_later_backends() {
        let dispatcher = Dispatcher::new(vec![
            fixed("primary", Attempt::Success("from primary".to_string())),
            Box::new(MustNotBeCalled),
        ]);
        assert_eq!(
            dispatcher.dispatch("prompt"),
            GenerationOutcome::Generated {
                text: "from primary".to_string(),
                backend: "primary",
            }
        );
    }

    #[test]
    fn unavailable_falls_through_to_next_backend() {
        let dispatcher = Dispatcher::new(vec![
            fixed("primary", Attempt::Unavailable("connection refused".to_string())),
            fixed("secondary", Attempt::Success("from secondary".to_string())),
        ]);
        assert_eq!(
            dispatcher.dispatch("prompt"),
            GenerationOutcome::Generated {
                text: "from secondary".to_string(),
                backend: "secondary",
            }
        );
    }

    #[test]
    fn skipped_and_unavailable_yield_no_backend() {
        let dispatcher = Dispatcher::new(vec![
            fixed("primary", Attempt::Unavailable("down".to_string())),
            fixed("secondary", Attempt::Skipped("no credential".to_string())),
        ]);
        assert_eq!(dispatcher.dispatch("prompt"), GenerationOutcome::NoBackend);
    }

    #[test]
    fn empty_completion_is_still_success() {
        let dispatcher = Dispatcher::new(vec![
            fixed("primary", Attempt::Success(String::new())),
            fixed("secondary", Attempt::Success("unreached".to_string())),
        ]);
        assert_eq!(
            dispatcher.dispatch("prompt"),
            GenerationOutcome::Generated {
                text: String::new(),
                backend: "primary",
            }
        );
    }

    #[test]
    fn openai_without_key_is_skipped() {
        let backend = OpenAiBackend::new(None, "gpt-4o-mini", 1000).unwrap();
        assert!(matches!(backend.attempt("prompt"), Attempt::Skipped(_)));
    }

    #[test]
    fn parses_ollama_generate_body() {
        let body = r#"{"model":"gemma:2b","created_at":"2024-01-01T00:00:00Z","response":"Total revenue is the sum of amounts.","done":true}"#;
        assert_eq!(
            parse_ollama_body(body).unwrap(),
            "Total revenue is the sum of amounts."
        );
    }

    #[test]
    fn missing_response_field_defaults_to_empty() {
        assert_eq!(parse_ollama_body(r#"{"done":true}"#).unwrap(), "");
    }

    #[test]
    fn parses_openai_chat_body() {
        let body = r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"Step t1 sums the amounts."},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_chat_body(body).unwrap(), "Step t1 sums the amounts.");
    }

    #[test]
    fn empty_choices_is_an_error() {
        assert!(parse_chat_body(r#"{"choices":[]}"#).is_err());
    }

    #[test]
    fn run_with_deadline_captures_stdout() {
        let output = run_with_deadline("cat", &[], "hello lineage", Duration::from_secs(5)).unwrap();
        assert_eq!(output.stdout, "hello lineage");
    }

    #[test]
    fn run_with_deadline_reports_missing_binary() {
        let err = run_with_deadline(
            "definitely-not-a-real-binary",
            &[],
            "",
            Duration::from_secs(1),
        );
        assert!(err.is_err());
    }

    #[test]
    fn run_with_deadline_kills_slow_child() {
        let err = run_with_deadline("sleep", &["5"], "", Duration::from_millis(200));
        assert!(err.unwrap_err().to_string().contains("timed out"));
    }
}
