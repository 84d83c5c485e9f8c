use std::io;
use std::path::PathBuf;
use std::process::Command;

/// What to execute for one deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external program to completion. Blocks the calling thread.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        let mut command = Command::new(&invocation.program);
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }
        command.envs(invocation.env.iter().map(|(k, v)| (k, v)));

        let output = command.output()?;
        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
