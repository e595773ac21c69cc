//! Redaction of credentials from log lines and error messages.
//!
//! Embedding and vector-store backends echo request details in their error
//! bodies, and `reqwest` errors carry full URLs. Everything that leaves the
//! process through tracing passes through [`ScrubbingMakeWriter`], and adapter
//! error messages are passed through [`scrub_message`] before they are wrapped.

use std::io::{self, Write};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing_subscriber::fmt::MakeWriter;

/// Compiled redaction rules.
pub struct SecretScrubber {
    api_key_pattern: Option<Regex>,
    bearer_pattern: Option<Regex>,
    field_pattern: Option<Regex>,
}

static SCRUBBER: LazyLock<SecretScrubber> = LazyLock::new(SecretScrubber::new);

impl SecretScrubber {
    pub fn new() -> Self {
        Self {
            // OpenAI and Anthropic style keys: sk-..., sk-proj-..., sk-ant-api03-...
            api_key_pattern: Regex::new(r"sk-[A-Za-z0-9_-]{16,}").ok(),
            bearer_pattern: Regex::new(r"Bearer\s+[A-Za-z0-9._~+/=-]+").ok(),
            // key=value, key: value, "key": "value" and URL query parameters
            field_pattern: Regex::new(
                r#"(?i)(["']?(?:api[_-]?key|x-chroma-token|access[_-]?token|token|secret|password)["']?\s*[:=]\s*)["']?[^"'\s,&}]+["']?"#,
            )
            .ok(),
        }
    }

    pub fn scrub(&self, message: &str) -> String {
        let mut scrubbed = message.to_string();

        if let Some(pattern) = &self.field_pattern {
            scrubbed = pattern
                .replace_all(&scrubbed, |caps: &Captures| format!("{}[REDACTED]", &caps[1]))
                .into_owned();
        }
        if let Some(pattern) = &self.api_key_pattern {
            scrubbed = pattern.replace_all(&scrubbed, "[API_KEY_REDACTED]").into_owned();
        }
        if let Some(pattern) = &self.bearer_pattern {
            scrubbed = pattern
                .replace_all(&scrubbed, "Bearer [TOKEN_REDACTED]")
                .into_owned();
        }

        scrubbed
    }
}

impl Default for SecretScrubber {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SecretScrubber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretScrubber").finish()
    }
}

/// Redact API keys, bearer tokens and secret-looking fields from `message`.
pub fn scrub_message(message: &str) -> String {
    SCRUBBER.scrub(message)
}

/// [`MakeWriter`] wrapper that redacts every formatted log record.
#[derive(Debug, Clone)]
pub struct ScrubbingMakeWriter<M> {
    inner: M,
}

impl<M> ScrubbingMakeWriter<M> {
    pub const fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for ScrubbingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = ScrubbingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        ScrubbingWriter {
            inner: self.inner.make_writer(),
        }
    }
}

/// Writer produced by [`ScrubbingMakeWriter`].
///
/// The fmt layer renders a whole record before writing it, so each `write`
/// call sees complete lines.
#[derive(Debug)]
pub struct ScrubbingWriter<W> {
    inner: W,
}

impl<W: Write> Write for ScrubbingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.inner.write_all(scrub_message(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
