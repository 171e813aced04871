//! 本地通道：以子进程方式运行编排器
//!
//! 主命令（默认 `codex exec python main_orchestrator.py`）失败（非零退出或无法启动）时，
//! 用同一份环境执行一次备用命令（默认 `python main_orchestrator.py`），只上报备用命令的结果。
//! 任务字段通过 Command::envs 叠加到继承环境上，不修改本进程的全局环境；
//! stdout / stderr 在进程运行期间并发读取，避免管道写满导致死锁。

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;
use crate::mission::Mission;
use crate::transport::{Transport, TransportOutcome};

/// 默认工作目录
pub const DEFAULT_WORKSPACE_DIR: &str = "/workspace/app";

pub fn default_primary_command() -> Vec<String> {
    ["codex", "exec", "python", "main_orchestrator.py"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn default_fallback_command() -> Vec<String> {
    ["python", "main_orchestrator.py"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// 可执行程序 + 参数（不经过 shell）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// argv[0] 为程序名；空 argv 视为配置错误
    pub fn from_argv(argv: &[String]) -> Result<Self, DispatchError> {
        match argv.split_first() {
            Some((program, args)) if !program.is_empty() => {
                Ok(Self::new(program.clone(), args.iter().cloned()))
            }
            _ => Err(DispatchError::InvalidConfig(
                "process command must name a program".to_string(),
            )),
        }
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// 进程通道：主命令 + 备用命令 + 固定工作目录
#[derive(Debug, Clone)]
pub struct LocalTransport {
    primary: ProcessSpec,
    fallback: ProcessSpec,
    workspace_dir: PathBuf,
}

/// 单次执行的捕获结果
#[derive(Debug)]
struct ProcessOutput {
    /// 被信号终止时为 None
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl ProcessOutput {
    fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

enum Attempt {
    Finished(ProcessOutput),
    SpawnFailed(std::io::Error),
    Cancelled,
}

impl LocalTransport {
    pub fn new(primary: ProcessSpec, fallback: ProcessSpec, workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            primary,
            fallback,
            workspace_dir: workspace_dir.into(),
        }
    }

    pub fn from_argv(
        primary: &[String],
        fallback: &[String],
        workspace_dir: impl Into<PathBuf>,
    ) -> Result<Self, DispatchError> {
        Ok(Self::new(
            ProcessSpec::from_argv(primary)?,
            ProcessSpec::from_argv(fallback)?,
            workspace_dir,
        ))
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    async fn run_process(
        &self,
        spec: &ProcessSpec,
        env: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Attempt {
        if cancel.is_cancelled() {
            return Attempt::Cancelled;
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&self.workspace_dir)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // 独立进程组：取消时连同包装器启动的子进程一起终止
        #[cfg(unix)]
        command.process_group(0);

        tracing::info!(command = %spec, dir = %self.workspace_dir.display(), "spawning orchestrator process");
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return Attempt::SpawnFailed(e),
        };
        // 在 child 之后声明，先于 child 析构，保证整组在 leader 被回收前收到信号
        let mut group = ProcessGroup::new(child.id());
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = async { tokio::join!(child.wait(), drain(stdout), drain(stderr)) } => Some(result),
        };

        let Some((status, stdout, stderr)) = finished else {
            group.kill();
            if let Err(e) = child.kill().await {
                tracing::warn!(command = %spec, error = %e, "failed to kill cancelled process");
            }
            return Attempt::Cancelled;
        };
        group.release();

        tracing::debug!(
            command = %spec,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "orchestrator process exited"
        );

        let (exit_code, stderr) = match status {
            Ok(status) => (status.code(), String::from_utf8_lossy(&stderr).into_owned()),
            Err(e) => (None, format!("wait failed: {}", e)),
        };
        Attempt::Finished(ProcessOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr,
        })
    }
}

/// 子进程所在的进程组。kill_on_drop 只杀直接子进程，这里在取消或 future 被丢弃时 SIGKILL 整组
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.filter(|p| *p > 0),
        }
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }

    /// 进程已正常退出并被回收，不再发信号
    fn release(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: kill 只发送信号；负 pid 表示整个进程组，pgid > 0 已保证不会命中本进程组
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        tracing::debug!(
            pgid,
            error = %std::io::Error::last_os_error(),
            "process group already gone"
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

/// 读完整个管道；读错误时保留已读部分
async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            tracing::warn!(error = %e, "reading process output failed");
        }
    }
    buf
}

#[async_trait]
impl Transport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    async fn dispatch(
        &self,
        mission: &Mission,
        cancel: &CancellationToken,
    ) -> Result<TransportOutcome, DispatchError> {
        let env = mission.env_overlay();

        match self.run_process(&self.primary, &env, cancel).await {
            Attempt::Finished(out) if out.success() => {
                return Ok(TransportOutcome::Completed {
                    output: out.stdout.trim().to_string(),
                });
            }
            Attempt::Cancelled => return Err(DispatchError::Cancelled),
            Attempt::Finished(out) => {
                tracing::warn!(
                    command = %self.primary,
                    exit_code = ?out.exit_code,
                    stderr = %out.stderr.trim(),
                    "primary command failed, running fallback"
                );
            }
            Attempt::SpawnFailed(e) => {
                tracing::warn!(
                    command = %self.primary,
                    error = %e,
                    "primary command could not start, running fallback"
                );
            }
        }

        match self.run_process(&self.fallback, &env, cancel).await {
            Attempt::Finished(out) if out.success() => Ok(TransportOutcome::Completed {
                output: out.stdout.trim().to_string(),
            }),
            Attempt::Finished(out) => Err(DispatchError::OrchestratorProcess {
                exit_code: out.exit_code,
                stderr: out.stderr.trim_end().to_string(),
            }),
            Attempt::SpawnFailed(e) => Err(DispatchError::OrchestratorProcess {
                exit_code: None,
                stderr: format!("failed to start '{}': {}", self.fallback, e),
            }),
            Attempt::Cancelled => Err(DispatchError::Cancelled),
        }
    }
}
