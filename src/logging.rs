//! Tracing setup with bot-token redaction.
//!
//! teloxide and reqwest errors can embed the full Bot API URL, which carries the token.
//! Everything written by the fmt layer passes through [`RedactingWriter`] first.

#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use std::io::{self, Write};
use tracing_subscriber::{prelude::*, EnvFilter};

/// `https://api.telegram.org/bot<token>/method`
static RE_TOKEN_URL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(https?://[^/\s]+/(?:file/)?bot)([0-9]+:[A-Za-z0-9_-]+)");

/// A bare token anywhere in the text
static RE_BARE_TOKEN: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"\b[0-9]{8,10}:[A-Za-z0-9_-]{35}\b");

/// Mask Telegram bot tokens in `input`
#[must_use]
pub fn redact(input: &str) -> String {
    let output = RE_TOKEN_URL.replace_all(input, "${1}[TELEGRAM_TOKEN]");
    RE_BARE_TOKEN
        .replace_all(&output, "[TELEGRAM_TOKEN]")
        .into_owned()
}

/// Writer that masks tokens before forwarding to `inner`
pub struct RedactingWriter<W: Write> {
    inner: W,
}

impl<W: Write> RedactingWriter<W> {
    /// Wrap `inner`
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&text).as_bytes())?;
        // The caller's buffer was consumed in full even if the redacted length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), redacted stderr.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let make_writer = || RedactingWriter::new(io::stderr());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}
