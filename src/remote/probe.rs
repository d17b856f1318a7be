//! Remote metadata probing and response parsing.
//!
//! The driver answers `meta <path>` with free-form text; the shapes we rely
//! on are narrow and fixed:
//!
//! - exactly 2 lines: the path is missing, or the session expired — the
//!   second line then carries the login-required marker;
//! - 7 or more lines: line index 5 carries a decimal size terminated by a
//!   comma, line index 6 carries a checksum label followed by two spaces and
//!   the checksum value. The label is either the driver's "possibly
//!   incorrect" placeholder (server has not finished hashing) or its
//!   verified form.
//!
//! Anything else is malformed. Malformed output degrades to [`MetadataResult::Missing`]
//! with a diagnostic — never a crash — and the upload decider then falls back
//! to uploading.

use crate::remote::driver::DriverOp;
use crate::remote::executor::RetryingExecutor;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Marker in the second line of a 2-line response when the session expired.
const LOGIN_REQUIRED_MARKER: &str = "重新登录";
/// Checksum label for a server-side placeholder value.
const CHECKSUM_UNCERTAIN_LABEL: &str = "md5 (可能不正确)";
/// Checksum label once the server has the real value.
const CHECKSUM_VERIFIED_LABEL: &str = "md5 (截图请打码)";
/// First-line marker in `fixmd5` output when the repair failed.
pub const REPAIR_FAILED_MARKER: &str = "修复md5失败";

const SIZE_LINE: usize = 5;
const CHECKSUM_LINE: usize = 6;

/// How much to trust a remote checksum. Equality against the local
/// fingerprint is authoritative only when `Certain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumConfidence {
    Certain,
    Uncertain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteChecksum {
    pub value: String,
    pub confidence: ChecksumConfidence,
}

/// Parsed result of a metadata query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataResult {
    Missing,
    NotLoggedIn,
    Present {
        /// Advisory only; sizes the upload timeout, never an equality test.
        size: u64,
        checksum: Option<RemoteChecksum>,
    },
}

fn size_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+),").expect("size pattern"))
}

/// Parse a recorded `meta` response. Pure over the captured lines, so it can
/// be tested against fixtures with no subprocess.
pub fn parse_meta(path: &str, lines: &[String]) -> MetadataResult {
    match lines.len() {
        0 | 1 => {
            warn!(path, lines = lines.len(), "truncated meta response, treating as missing");
            MetadataResult::Missing
        }
        2 => {
            if lines[1].contains(LOGIN_REQUIRED_MARKER) {
                MetadataResult::NotLoggedIn
            } else {
                MetadataResult::Missing
            }
        }
        n if n > CHECKSUM_LINE => {
            let size = match size_re()
                .captures(&lines[SIZE_LINE])
                .and_then(|c| c[1].parse::<u64>().ok())
            {
                Some(size) => size,
                None => {
                    warn!(path, line = %lines[SIZE_LINE], "unparseable size field, treating as missing");
                    return MetadataResult::Missing;
                }
            };
            match parse_checksum_line(&lines[CHECKSUM_LINE]) {
                Some(checksum) => MetadataResult::Present {
                    size,
                    checksum: Some(checksum),
                },
                None => {
                    warn!(path, line = %lines[CHECKSUM_LINE], "unparseable checksum field, treating as missing");
                    MetadataResult::Missing
                }
            }
        }
        n => {
            warn!(path, lines = n, "unexpected meta response shape, treating as missing");
            MetadataResult::Missing
        }
    }
}

fn parse_checksum_line(line: &str) -> Option<RemoteChecksum> {
    for (label, confidence) in [
        (CHECKSUM_VERIFIED_LABEL, ChecksumConfidence::Certain),
        (CHECKSUM_UNCERTAIN_LABEL, ChecksumConfidence::Uncertain),
    ] {
        if let Some(idx) = line.find(label) {
            let rest = &line[idx + label.len()..];
            if let Some(value) = rest.strip_prefix("  ") {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(RemoteChecksum {
                        value: value.to_string(),
                        confidence,
                    });
                }
            }
        }
    }
    None
}

/// Queries remote metadata through the retrying executor.
#[derive(Clone)]
pub struct RemoteProbe {
    executor: Arc<RetryingExecutor>,
}

impl RemoteProbe {
    pub fn new(executor: Arc<RetryingExecutor>) -> Self {
        Self { executor }
    }

    /// Query metadata for one remote path.
    ///
    /// Transport failure degrades to `Missing` the same way malformed output
    /// does: the caller either uploads (files) or attempts creation
    /// (directories), and remote state stays authoritative.
    pub async fn query(&self, path: &str) -> MetadataResult {
        match self.executor.run(&DriverOp::Meta(path.to_string())).await {
            Ok(lines) => {
                let result = parse_meta(path, &lines);
                debug!(path, ?result, "meta probe");
                result
            }
            Err(e) => {
                warn!(path, "meta query failed, treating as missing: {}", e);
                MetadataResult::Missing
            }
        }
    }
}
