use std::fmt;
use std::path::Path;

use super::store::JobConfig;

/// Output flag passed on every invocation so the tool prints plain lines.
pub const FORMAT_FLAG: &str = "--plain-output";

/// A request to run one job type against one organization.
#[derive(Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub access_token: String,
    pub organization: String,
    pub job_type: String,
    pub dry_run: bool,
}

impl JobRequest {
    pub fn new(
        access_token: impl Into<String>,
        organization: impl Into<String>,
        job_type: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            organization: organization.into(),
            job_type: job_type.into(),
            dry_run,
        }
    }
}

// Keeps the access token out of logs and panic messages.
impl fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRequest")
            .field("access_token", &"<redacted>")
            .field("organization", &self.organization)
            .field("job_type", &self.job_type)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Ordered argument list for the external tool.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct CommandArgs(Vec<String>);

impl CommandArgs {
    /// Build the arguments for `<tool> run <job-file> ...`.
    ///
    /// The order is fixed; a dry run only appends `--log-level debug --dry-run`.
    pub fn build(request: &JobRequest, config: &JobConfig, job_file: &Path) -> Self {
        let mut args: Vec<String> = vec![
            "run".into(),
            job_file.to_string_lossy().into_owned(),
            "--token".into(),
            request.access_token.clone(),
            "--org".into(),
            request.organization.clone(),
            "--branch".into(),
            config.branch.clone(),
            "--pr-title".into(),
            config.pr_title.clone(),
            "--pr-body".into(),
            config.pr_body.clone(),
            FORMAT_FLAG.into(),
        ];
        if request.dry_run {
            args.extend(["--log-level", "debug", "--dry-run"].map(String::from));
        }
        Self(args)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for CommandArgs {
    fn from(args: Vec<String>) -> Self {
        Self(args)
    }
}

impl fmt::Debug for CommandArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        let mut redact_next = false;
        for arg in &self.0 {
            if redact_next {
                list.entry(&"<redacted>");
            } else {
                list.entry(arg);
            }
            redact_next = arg == "--token";
        }
        list.finish()
    }
}
