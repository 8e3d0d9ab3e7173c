use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Redaction rules applied in order: pattern and its replacement.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        // Anthropic API keys: sk-ant-api03-...
        (r"sk-ant-[a-zA-Z0-9_-]{20,}", "[API_KEY_REDACTED]"),
        (r"Bearer\s+[a-zA-Z0-9_.\-]+", "Bearer [TOKEN_REDACTED]"),
        (r"\bAKIA[0-9A-Z]{16}\b", "[AWS_KEY_REDACTED]"),
        (
            r"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----",
            "[PRIVATE_KEY_REDACTED]",
        ),
        // `api_key: ...`, `token=...`, `secret: ...` assignments
        (
            r#"(?i)["']?(api_key|apikey|token|secret)["']?\s*([:=])\s*["']?[a-zA-Z0-9_.\-]{16,}["']?"#,
            "${1}${2}[REDACTED]",
        ),
        (r#"(?i)["']?password["']?\s*[:=]\s*["']?[^"'\s,}]+["']?"#, "password=[REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Redacts credentials from text before it leaves a tool backend.
#[derive(Clone, Copy, Default)]
pub struct SecretScrubber;

impl SecretScrubber {
    pub fn new() -> Self {
        Self
    }

    /// Scrub a message of sensitive data
    pub fn scrub(&self, message: &str) -> String {
        RULES
            .iter()
            .fold(message.to_string(), |text, (re, replacement)| {
                re.replace_all(&text, *replacement).into_owned()
            })
    }

    /// True if the text contains anything `scrub` would redact.
    pub fn contains_secret(&self, message: &str) -> bool {
        RULES.iter().any(|(re, _)| re.is_match(message))
    }
}

impl fmt::Debug for SecretScrubber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretScrubber").finish()
    }
}
