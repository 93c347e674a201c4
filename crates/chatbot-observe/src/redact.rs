//! Secret redaction for everything that leaves the process as a log line.
//!
//! Two layers:
//! - [`Redactor::redact_text`] replaces the literal values of secret-bearing
//!   environment variables anywhere in a formatted string.
//! - [`Redactor::redact_fields`] replaces whole values in a JSON object when
//!   the key names a secret or the value looks like one.
//!
//! [`RedactingMakeWriter`] applies the text layer to every line a
//! `tracing-subscriber` fmt layer writes.

use std::fmt;
use std::io;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing_subscriber::fmt::MakeWriter;

/// Replacement marker for redacted values.
pub const REDACTED: &str = "***REDACTED***";

/// Environment variables whose values are always treated as secrets.
pub const SECRET_ENV_NAMES: &[&str] = &["OPENAI_API_KEY", "DISCORD_TOKEN"];

/// Any environment variable whose name starts with one of these is a secret.
pub const SECRET_ENV_PREFIXES: &[&str] = &["SLACK_"];

/// Heuristic: at least 20 characters with both a letter and a digit.
pub fn looks_like_secret(value: &str) -> bool {
    value.chars().count() >= 20
        && value.chars().any(char::is_alphabetic)
        && value.chars().any(|c| c.is_ascii_digit())
}

struct RedactorInner {
    /// Literal secret values, longest first so overlapping values redact fully.
    values: Vec<String>,
    names: Vec<String>,
    prefixes: Vec<String>,
}

/// Cheap-to-clone redaction policy.
///
/// Does NOT print the secret values in its `Debug` output.
#[derive(Clone)]
pub struct Redactor {
    inner: Arc<RedactorInner>,
}

impl Redactor {
    /// Build a redactor from an environment snapshot.
    ///
    /// Collects the values of `names` and of every variable starting with one
    /// of `prefixes`. Empty values are ignored.
    pub fn from_vars<I>(vars: I, names: &[&str], prefixes: &[&str]) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut values: Vec<String> = vars
            .into_iter()
            .filter(|(key, value)| {
                !value.is_empty()
                    && (names.contains(&key.as_str())
                        || prefixes.iter().any(|p| key.starts_with(p)))
            })
            .map(|(_, value)| value)
            .collect();
        values.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        values.dedup();

        Self {
            inner: Arc::new(RedactorInner {
                values,
                names: names.iter().map(|n| n.to_uppercase()).collect(),
                prefixes: prefixes.iter().map(|p| p.to_uppercase()).collect(),
            }),
        }
    }

    /// Build a redactor from the current process environment with the
    /// default secret names and prefixes.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars(), SECRET_ENV_NAMES, SECRET_ENV_PREFIXES)
    }

    /// A redactor that knows no secret values (key and heuristic checks still apply).
    pub fn empty() -> Self {
        Self::from_vars(Vec::new(), SECRET_ENV_NAMES, SECRET_ENV_PREFIXES)
    }

    /// Number of literal secret values this redactor replaces.
    pub fn secret_count(&self) -> usize {
        self.inner.values.len()
    }

    /// Replace every occurrence of a known secret value with [`REDACTED`].
    pub fn redact_text(&self, text: &str) -> String {
        let mut out = text.to_string();
        for value in &self.inner.values {
            if out.contains(value.as_str()) {
                out = out.replace(value.as_str(), REDACTED);
            }
        }
        out
    }

    /// Whether a mapping key names a secret (case-insensitive).
    pub fn is_secret_key(&self, key: &str) -> bool {
        let upper = key.to_uppercase();
        self.inner.names.iter().any(|n| *n == upper)
            || self.inner.prefixes.iter().any(|p| upper.starts_with(p.as_str()))
    }

    /// Redact the string values of a JSON object, one level deep.
    ///
    /// A value is replaced outright when its key is a secret name or prefix or
    /// when it looks like a secret; other strings get text redaction.
    /// Non-string values are left as they are.
    pub fn redact_fields(&self, fields: &Map<String, Value>) -> Map<String, Value> {
        fields
            .iter()
            .map(|(key, value)| {
                let redacted = match value {
                    Value::String(s) if self.is_secret_key(key) || looks_like_secret(s) => {
                        Value::String(REDACTED.to_string())
                    }
                    Value::String(s) => Value::String(self.redact_text(s)),
                    other => other.clone(),
                };
                (key.clone(), redacted)
            })
            .collect()
    }

    /// Structured redaction for an arbitrary payload: objects get
    /// [`redact_fields`](Self::redact_fields), anything else passes through.
    pub fn redact_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.redact_fields(map)),
            Value::String(s) => Value::String(self.redact_text(s)),
            other => other.clone(),
        }
    }
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redactor")
            .field("secret_values", &self.inner.values.len())
            .field("names", &self.inner.names)
            .field("prefixes", &self.inner.prefixes)
            .finish()
    }
}

/// [`MakeWriter`] that redacts each formatted record before it reaches `inner`.
#[derive(Clone)]
pub struct RedactingMakeWriter<M> {
    inner: M,
    redactor: Redactor,
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(inner: M, redactor: Redactor) -> Self {
        Self { inner, redactor }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: self.inner.make_writer(),
            redactor: self.redactor.clone(),
            buf: Vec::new(),
        }
    }
}

/// Buffers one record and writes it redacted on flush or drop.
///
/// The fmt layer creates one writer per event, so a whole record is redacted
/// at once and a secret never straddles two writes.
pub struct RedactingWriter<W: io::Write> {
    inner: W,
    redactor: Redactor,
    buf: Vec<u8>,
}

impl<W: io::Write> RedactingWriter<W> {
    fn write_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.buf);
        let redacted = self.redactor.redact_text(&text);
        self.buf.clear();
        self.inner.write_all(redacted.as_bytes())
    }
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.write_buffered()?;
        self.inner.flush()
    }
}

impl<W: io::Write> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        let _ = self.write_buffered();
        let _ = self.inner.flush();
    }
}
