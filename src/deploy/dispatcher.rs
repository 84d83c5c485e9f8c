use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use serde::Serialize;

use crate::config::Config;
use crate::deploy::runner::{Invocation, ProcessRunner};
use crate::webhook::WebhookEvent;

/// The only ref that triggers a deploy.
pub const TRACKED_REF: &str = "refs/heads/main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Success,
    Failure,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployOutcome {
    pub status: DeployStatus,
    pub message: String,
}

impl DeployOutcome {
    fn success(message: String) -> Self {
        Self {
            status: DeployStatus::Success,
            message,
        }
    }

    fn failure(message: String) -> Self {
        Self {
            status: DeployStatus::Failure,
            message,
        }
    }

    fn skipped(message: String) -> Self {
        Self {
            status: DeployStatus::Skipped,
            message,
        }
    }
}

/// Runs deploy scripts for authenticated events. Callers must verify the
/// delivery first.
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<Config>,
    runner: Arc<dyn ProcessRunner>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    /// Blocks until the script exits. Never panics on process errors.
    pub fn dispatch(&self, target_id: &str, event: &WebhookEvent) -> DeployOutcome {
        if event.reference != TRACKED_REF {
            info!(
                "Ignoring push to {} for target {}",
                event.reference, target_id
            );
            return DeployOutcome::skipped(format!(
                "ref {} is not tracked, only {} deploys",
                event.reference, TRACKED_REF
            ));
        }

        let Some(target) = self.config.target(target_id) else {
            error!("Dispatch requested for unconfigured target {}", target_id);
            return DeployOutcome::failure(format!("unknown deploy target `{}`", target_id));
        };

        // Relative paths resolve against the server's working directory.
        let script = match fs::canonicalize(&target.script) {
            Ok(script) => script,
            Err(e) => {
                error!(
                    "Deploy script {} for target {} does not exist: {}",
                    target.script.display(),
                    target_id,
                    e
                );
                return DeployOutcome::failure(format!(
                    "deploy script {} not found",
                    target.script.display()
                ));
            }
        };

        let invocation = invocation_for(target_id, &script, event);
        info!(
            "Running {} for target {} (commit {})",
            script.display(),
            target_id,
            event.short_commit().unwrap_or("unknown")
        );

        match self.runner.run(&invocation) {
            Ok(output) if output.success() => {
                info!("Deploy of {} succeeded", target_id);
                if !output.stdout.trim().is_empty() {
                    info!("Deploy output for {}: {}", target_id, output.stdout.trim());
                }
                DeployOutcome::success(format!("deployed `{}`", target_id))
            }
            Ok(output) => {
                let status = output
                    .exit_code
                    .map_or_else(|| "a signal".to_string(), |code| format!("status {}", code));
                let stream = if output.stderr.trim().is_empty() {
                    output.stdout.trim()
                } else {
                    output.stderr.trim()
                };
                error!(
                    "Deploy of {} exited with {}: {}",
                    target_id, status, stream
                );
                DeployOutcome::failure(format!(
                    "deploy script for `{}` exited with {}: {}",
                    target_id, status, stream
                ))
            }
            Err(e) => {
                error!(
                    "Failed to launch {} for target {}: {}",
                    script.display(),
                    target_id,
                    e
                );
                DeployOutcome::failure(format!(
                    "failed to run deploy script {}: {}",
                    script.display(),
                    e
                ))
            }
        }
    }
}

fn invocation_for(target_id: &str, script: &Path, event: &WebhookEvent) -> Invocation {
    let mut env = vec![
        ("DEPLOY_TARGET".to_string(), target_id.to_string()),
        ("DEPLOY_REF".to_string(), event.reference.clone()),
    ];
    if let Some(commit) = &event.after {
        env.push(("DEPLOY_COMMIT".to_string(), commit.clone()));
    }

    Invocation {
        program: script.to_path_buf(),
        working_dir: script.parent().map(Path::to_path_buf),
        env,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::runner::ProcessOutput;
    use std::io;
    use std::sync::Mutex;

    struct FakeRunner {
        result: fn() -> io::Result<ProcessOutput>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl FakeRunner {
        fn new(result: fn() -> io::Result<ProcessOutput>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            (self.result)()
        }
    }

    fn exit(code: i32, stderr: &str) -> io::Result<ProcessOutput> {
        Ok(ProcessOutput {
            exit_code: Some(code),
            stdout: "building...\n".to_string(),
            stderr: stderr.to_string(),
        })
    }

    /// Config whose `blog` script exists (the temp file) and whose `shop`
    /// script does not.
    fn setup(runner: Arc<FakeRunner>) -> (Dispatcher, tempfile::NamedTempFile) {
        let script = tempfile::NamedTempFile::new().unwrap();
        let config = Config::from_toml(&format!(
            "[targets.blog]\nscript = {:?}\n\n[targets.shop]\nscript = \"/nonexistent/shop.sh\"\n",
            script.path().display().to_string()
        ))
        .unwrap();
        (Dispatcher::new(Arc::new(config), runner), script)
    }

    #[test]
    fn untracked_ref_is_skipped_without_running() {
        let runner = FakeRunner::new(|| exit(0, ""));
        let (dispatcher, _script) = setup(runner.clone());

        let outcome = dispatcher.dispatch("blog", &WebhookEvent::new("refs/heads/feature-x"));

        assert_eq!(outcome.status, DeployStatus::Skipped);
        assert!(outcome.message.contains("refs/heads/feature-x"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn tracked_ref_runs_script_with_event_environment() {
        let runner = FakeRunner::new(|| exit(0, ""));
        let (dispatcher, script) = setup(runner.clone());
        let mut event = WebhookEvent::new(TRACKED_REF);
        event.after = Some("6113728f27ae82c7b1a177c8d03f9e96e0adf246".to_string());

        let outcome = dispatcher.dispatch("blog", &event);

        assert_eq!(outcome.status, DeployStatus::Success);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        let resolved = script.path().canonicalize().unwrap();
        assert_eq!(calls[0].program, resolved);
        assert_eq!(calls[0].working_dir.as_deref(), resolved.parent());
        assert!(calls[0]
            .env
            .contains(&("DEPLOY_TARGET".to_string(), "blog".to_string())));
        assert!(calls[0]
            .env
            .contains(&("DEPLOY_REF".to_string(), TRACKED_REF.to_string())));
        assert!(calls[0].env.contains(&(
            "DEPLOY_COMMIT".to_string(),
            "6113728f27ae82c7b1a177c8d03f9e96e0adf246".to_string()
        )));
    }

    #[test]
    fn nonzero_exit_carries_stderr() {
        let runner = FakeRunner::new(|| exit(2, "npm ERR! missing script: build\n"));
        let (dispatcher, _script) = setup(runner);

        let outcome = dispatcher.dispatch("blog", &WebhookEvent::new(TRACKED_REF));

        assert_eq!(outcome.status, DeployStatus::Failure);
        assert!(outcome.message.contains("status 2"));
        assert!(outcome.message.contains("npm ERR! missing script: build"));
    }

    #[test]
    fn launch_error_becomes_failure() {
        let runner = FakeRunner::new(|| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"))
        });
        let (dispatcher, _script) = setup(runner);

        let outcome = dispatcher.dispatch("blog", &WebhookEvent::new(TRACKED_REF));

        assert_eq!(outcome.status, DeployStatus::Failure);
        assert!(outcome.message.contains("permission denied"));
    }

    #[test]
    fn missing_script_fails_without_running() {
        let runner = FakeRunner::new(|| exit(0, ""));
        let (dispatcher, _script) = setup(runner.clone());

        let outcome = dispatcher.dispatch("shop", &WebhookEvent::new(TRACKED_REF));

        assert_eq!(outcome.status, DeployStatus::Failure);
        assert!(outcome.message.contains("/nonexistent/shop.sh"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn unknown_target_fails() {
        let runner = FakeRunner::new(|| exit(0, ""));
        let (dispatcher, _script) = setup(runner.clone());

        let outcome = dispatcher.dispatch("ghost", &WebhookEvent::new(TRACKED_REF));

        assert_eq!(outcome.status, DeployStatus::Failure);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn outcome_serializes_lowercase_status() {
        let json = serde_json::to_value(DeployOutcome::skipped("nope".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "skipped", "message": "nope"}));
    }

    #[cfg(unix)]
    #[test]
    fn relative_script_paths_run_from_their_own_directory() {
        use crate::deploy::runner::SystemRunner;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        // Both scripts fail unless they run from the directory that holds them.
        let dir = tempfile::tempdir_in(".").unwrap();
        fs::create_dir(dir.path().join("scripts")).unwrap();
        let nested = dir.path().join("scripts").join("blog.sh");
        fs::write(&nested, "#!/bin/sh
test -f blog.sh
").unwrap();
        fs::set_permissions(&nested, fs::Permissions::from_mode(0o755)).unwrap();

        let mut bare = tempfile::Builder::new()
            .prefix("deploy-")
            .suffix(".sh")
            .tempfile_in(".")
            .unwrap();
        let bare_name = bare.path().file_name().unwrap().to_str().unwrap().to_string();
        write!(bare, "#!/bin/sh
test -f {}
", bare_name).unwrap();
        let bare = bare.into_temp_path();
        fs::set_permissions(&bare, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(nested.is_relative());
        let config = Config::from_toml(&format!(
            "[targets.blog]\nscript = {:?}\n\n[targets.shop]\nscript = {:?}\n",
            nested.display().to_string(),
            bare_name
        ))
        .unwrap();
        let dispatcher = Dispatcher::new(Arc::new(config), Arc::new(SystemRunner));

        for target in ["blog", "shop"] {
            let outcome = dispatcher.dispatch(target, &WebhookEvent::new(TRACKED_REF));
            assert_eq!(outcome.status, DeployStatus::Success, "{}: {}", target, outcome.message);
        }
    }
}
