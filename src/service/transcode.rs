use crate::config::CharsetFixup;
use crate::error::MigrateError;
use regex::Regex;
use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

const FROM: &str = "latin1";
const TO: &str = "utf8";

/// Lines of a dump that carry charset or collation metadata.
static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(SET\s+NAMES|CHARACTER\s+SET|CHARSET|character_set_\w+|COLLATE|COLLATION)\b",
    )
    .expect("charset declaration pattern must compile")
});

/// Counters gathered while transcoding one dump.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeReport {
    pub lines: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub lines_rewritten: u64,
}

/// Decode ISO-8859-1 bytes. Every byte maps to the code point of the same value.
pub fn latin1_to_utf8(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Applies a [`CharsetFixup`] policy to one decoded line.
#[derive(Debug, Clone, Copy)]
pub struct CharsetRewriter {
    mode: CharsetFixup,
}

impl CharsetRewriter {
    pub fn new(mode: CharsetFixup) -> Self {
        Self { mode }
    }

    pub fn rewrite<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if !line.contains(FROM) {
            return Cow::Borrowed(line);
        }
        match self.mode {
            CharsetFixup::Every => Cow::Owned(line.replace(FROM, TO)),
            CharsetFixup::FirstPerLine => Cow::Owned(line.replacen(FROM, TO, 1)),
            CharsetFixup::Declarations if is_declaration(line) => {
                Cow::Owned(line.replace(FROM, TO))
            }
            CharsetFixup::Declarations => Cow::Borrowed(line),
        }
    }
}

fn is_declaration(line: &str) -> bool {
    let trimmed = line.trim_start();
    // Row data may mention "charset" or "collate" in plain text.
    if trimmed
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("INSERT"))
    {
        return false;
    }
    DECLARATION.is_match(line)
}

/// Transcode one in-memory chunk; used by the streaming path for each line.
pub fn transcode_line(raw: &[u8], rewriter: &CharsetRewriter) -> (String, bool) {
    let decoded = latin1_to_utf8(raw);
    match rewriter.rewrite(&decoded) {
        Cow::Borrowed(_) => (decoded, false),
        Cow::Owned(changed) => {
            let rewritten = changed != decoded;
            (changed, rewritten)
        }
    }
}

/// Stream `src` (ISO-8859-1) into `dst` (UTF-8), fixing charset directives.
///
/// Line endings are preserved byte for byte. `dst` is created or truncated.
pub async fn transcode_file(
    src: &Path,
    dst: &Path,
    mode: CharsetFixup,
) -> Result<TranscodeReport, MigrateError> {
    let input = File::open(src)
        .await
        .map_err(|e| MigrateError::io(src, e))?;
    let output = File::create(dst)
        .await
        .map_err(|e| MigrateError::io(dst, e))?;

    let mut reader = BufReader::new(input);
    let mut writer = BufWriter::new(output);
    let rewriter = CharsetRewriter::new(mode);
    let mut report = TranscodeReport::default();
    let mut buf = Vec::with_capacity(8 * 1024);

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| MigrateError::io(src, e))?;
        if n == 0 {
            break;
        }
        let (line, rewritten) = transcode_line(&buf, &rewriter);
        if rewritten {
            report.lines_rewritten += 1;
            debug!(line = report.lines + 1, "rewrote charset reference");
        }
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| MigrateError::io(dst, e))?;
        report.lines += 1;
        report.bytes_in += n as u64;
        report.bytes_out += line.len() as u64;
    }

    writer.flush().await.map_err(|e| MigrateError::io(dst, e))?;
    Ok(report)
}
