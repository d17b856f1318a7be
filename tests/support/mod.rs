//! Scripted in-memory remote driver for integration tests.
//!
//! Models the remote namespace as in-memory state and answers the four
//! driver commands with the same line shapes the real driver prints, so the
//! whole engine can be exercised without a subprocess.

use async_trait::async_trait;
use md5::{Digest, Md5};
use netmirror::config::{MirrorConfig, MirrorSettings, RetrySettings};
use netmirror::remote::driver::{DriverOp, DriverTransport, TransportError};
use netmirror::tree::node::join_remote;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Certain,
    Uncertain,
}

#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub size: u64,
    pub md5: String,
    pub confidence: Confidence,
}

#[derive(Default)]
struct State {
    dirs: HashSet<String>,
    files: HashMap<String, RemoteFile>,
    calls: Vec<DriverOp>,
    deny_login_under: Option<String>,
    fail_repair: HashSet<String>,
    repair_value: HashMap<String, String>,
}

#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<State>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, path: &str) {
        self.state.lock().dirs.insert(path.to_string());
    }

    pub fn add_file(&self, path: &str, size: u64, md5: &str, confidence: Confidence) {
        self.state.lock().files.insert(
            path.to_string(),
            RemoteFile {
                size,
                md5: md5.to_string(),
                confidence,
            },
        );
    }

    /// Answer the login-required response for every path at or under
    /// `prefix`.
    pub fn deny_login_under(&self, prefix: &str) {
        self.state.lock().deny_login_under = Some(prefix.to_string());
    }

    /// Make `fixmd5` report failure for `path`.
    pub fn fail_repair_for(&self, path: &str) {
        self.state.lock().fail_repair.insert(path.to_string());
    }

    /// On successful repair of `path`, replace its checksum with `md5`.
    pub fn set_repair_value(&self, path: &str, md5: &str) {
        self.state
            .lock()
            .repair_value
            .insert(path.to_string(), md5.to_string());
    }

    pub fn calls(&self) -> Vec<DriverOp> {
        self.state.lock().calls.clone()
    }

    pub fn mkdir_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|op| match op {
                DriverOp::Mkdir(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn upload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|op| matches!(op, DriverOp::Upload { .. }))
            .count()
    }

    pub fn meta_count_for(&self, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|op| matches!(op, DriverOp::Meta(p) if p == path))
            .count()
    }

    pub fn fixmd5_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|op| matches!(op, DriverOp::FixMd5(_)))
            .count()
    }

    pub fn remote_file(&self, path: &str) -> Option<RemoteFile> {
        self.state.lock().files.get(path).cloned()
    }

    fn denied(state: &State, path: &str) -> bool {
        match &state.deny_login_under {
            Some(prefix) => path == prefix || path.starts_with(&format!("{}/", prefix)),
            None => false,
        }
    }
}

fn login_lines() -> Vec<String> {
    vec!["错误".to_string(), "会话已过期, 请重新登录".to_string()]
}

fn missing_lines() -> Vec<String> {
    vec!["错误".to_string(), "文件或目录不存在".to_string()]
}

fn file_lines(file: &RemoteFile) -> Vec<String> {
    let label = match file.confidence {
        Confidence::Certain => "md5 (截图请打码)",
        Confidence::Uncertain => "md5 (可能不正确)",
    };
    vec![
        "----".to_string(),
        "文件名: x".to_string(),
        "路径: x".to_string(),
        "类型: 文件".to_string(),
        "创建时间: 2021-07-30 10:00:00".to_string(),
        format!("大小: {}, -", file.size),
        format!("{}  {}", label, file.md5),
        "----".to_string(),
    ]
}

fn dir_lines() -> Vec<String> {
    vec![
        "----".to_string(),
        "文件名: x".to_string(),
        "路径: x".to_string(),
        "类型: 目录".to_string(),
        "创建时间: 2021-07-30 10:00:00".to_string(),
        "大小: 0, -".to_string(),
        "md5 (截图请打码)  -".to_string(),
        "----".to_string(),
    ]
}

#[async_trait]
impl DriverTransport for FakeRemote {
    async fn invoke(&self, op: &DriverOp) -> Result<Vec<String>, TransportError> {
        let mut state = self.state.lock();
        state.calls.push(op.clone());
        let lines = match op {
            DriverOp::Meta(path) => {
                if Self::denied(&state, path) {
                    login_lines()
                } else if let Some(file) = state.files.get(path) {
                    file_lines(file)
                } else if state.dirs.contains(path) {
                    dir_lines()
                } else {
                    missing_lines()
                }
            }
            DriverOp::Mkdir(path) => {
                if Self::denied(&state, path) {
                    login_lines()
                } else {
                    state.dirs.insert(path.clone());
                    vec!["创建目录成功".to_string()]
                }
            }
            DriverOp::Upload {
                local_path,
                remote_parent,
                size,
            } => {
                let content = std::fs::read(local_path)?;
                let md5 = hex::encode(Md5::digest(&content));
                let name = local_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                state.files.insert(
                    join_remote(remote_parent, &name),
                    RemoteFile {
                        size: *size,
                        md5,
                        confidence: Confidence::Certain,
                    },
                );
                vec!["上传成功".to_string()]
            }
            DriverOp::FixMd5(path) => {
                if state.fail_repair.contains(path) {
                    vec!["修复md5失败".to_string()]
                } else {
                    let replacement = state.repair_value.get(path).cloned();
                    if let Some(file) = state.files.get_mut(path) {
                        file.confidence = Confidence::Certain;
                        if let Some(md5) = replacement {
                            file.md5 = md5;
                        }
                    }
                    vec!["修复md5成功".to_string()]
                }
            }
        };
        Ok(lines)
    }
}

/// Hex MD5 of a byte slice, for seeding expected remote state.
pub fn md5_hex(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}

/// Config over a temp source tree with default retry policy.
pub fn make_config(
    src: &Path,
    dst: &str,
    ignore: Option<&str>,
    include: Option<&str>,
) -> MirrorConfig {
    MirrorConfig::from_settings(MirrorSettings {
        driver: Path::new("/unused/driver").to_path_buf(),
        src: src.to_path_buf(),
        dst: dst.to_string(),
        ignore: ignore.map(str::to_string),
        include: include.map(str::to_string),
        retry: RetrySettings::default(),
    })
    .unwrap()
}
