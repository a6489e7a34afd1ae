//! Isolated data directory, project directory and server processes

use super::cli::{binary_path, RlCommand};
use anyhow::{Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Ask the OS for a port nobody is listening on
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("Failed to find a free port")
}

/// Per-test sandbox: its own data directory, project and port
pub struct TestEnv {
    data_dir: TempDir,
    _project: TempDir,
    project_dir: PathBuf,
    pub port: u16,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        let project = TempDir::new().context("Failed to create project dir")?;
        // Canonical so it matches what the CLI resolves from its cwd
        let project_dir = project.path().canonicalize()?;

        Ok(Self {
            data_dir: TempDir::new().context("Failed to create data dir")?,
            _project: project,
            project_dir,
            port: free_port(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn project_str(&self) -> String {
        self.project_dir.to_string_lossy().into_owned()
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir().join("server.pid")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir().join("server.log")
    }

    /// A `redline` command running in the project with this sandbox's settings
    pub fn command(&self) -> RlCommand {
        let mut cmd = RlCommand::new(self.project_dir());
        cmd.env("REDLINE_DATA_DIR", self.data_dir())
            .env("REDLINE_PORT", self.port.to_string());
        cmd
    }

    /// Write (or overwrite) a file inside the project
    pub fn write_file(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.project_dir().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Run `redline server` in the foreground and wait for it to answer
    pub async fn start_server(&self) -> Result<ServerProcess> {
        let child = Command::new(binary_path())
            .arg("server")
            .current_dir(self.project_dir())
            .env("REDLINE_DATA_DIR", self.data_dir())
            .env("REDLINE_PORT", self.port.to_string())
            .env_remove("RUST_LOG")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn server")?;

        let server = ServerProcess { child };
        wait_for_server(&self.base_url(), Duration::from_secs(10)).await?;
        Ok(server)
    }
}

impl Drop for TestEnv {
    /// Never leave a daemon behind
    fn drop(&mut self) {
        let Ok(contents) = fs::read_to_string(self.pid_file()) else {
            return;
        };
        if let Ok(pid) = contents.trim().parse::<i32>() {
            let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
        }
    }
}

/// Foreground server; interrupted and reaped on drop
pub struct ServerProcess {
    child: Child,
}

impl ServerProcess {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Send SIGINT and wait for the process to exit
    pub fn interrupt(&mut self, wait: Duration) -> Result<std::process::ExitStatus> {
        kill(Pid::from_raw(self.child.id() as i32), Signal::SIGINT)?;

        let deadline = Instant::now() + wait;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                anyhow::bail!("Server did not exit within {:?}", wait);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return;
        }
        if self.interrupt(Duration::from_secs(5)).is_err() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Poll the root route until it answers
pub async fn wait_for_server(base_url: &str, wait: Duration) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()?;
    let deadline = tokio::time::Instant::now() + wait;

    loop {
        if let Ok(response) = client.get(base_url).send().await {
            if response.status().is_success() {
                return Ok(());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("Server at {} did not become ready", base_url);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Poll until nothing answers on the port
pub async fn wait_for_shutdown(base_url: &str, wait: Duration) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()?;
    let deadline = tokio::time::Instant::now() + wait;

    loop {
        if client.get(base_url).send().await.is_err() {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("Server at {} is still answering", base_url);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
