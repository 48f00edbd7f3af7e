//! The deployment goal: transform, gate, install, provision, extract.
//!
//! Stages run strictly in order and the first failure ends the run. Nothing
//! is retried and nothing already done is undone.

use std::sync::Arc;
use tracing::Instrument;

use crate::context::{EnvironmentTag, ExecutionContext};
use crate::defaults::ProvisionConfig;
use crate::error::{Error, Result};
use crate::goal::GoalDetails;
use crate::logs::{OutputCapture, ProgressLog};
use crate::manifest::ManifestGate;
use crate::output::{ExternalUrl, PipelineResult};
use crate::permalink;
use crate::process::{EnvOverlay, ProcessRunner, ProcessStep, SpawnRunner};
use crate::stack::{DefaultStackNames, StackNamer};
use crate::transform::{TransformSpec, TransformStage};
use crate::tree::WorkingTree;

/// Config key reported when no token can be resolved.
const TOKEN_KEY: &str = "provision.token";

pub struct PipelineExecutor {
    config: ProvisionConfig,
    transforms: TransformStage,
    stack_namer: Box<dyn StackNamer>,
    token: Option<String>,
    runner: Arc<dyn ProcessRunner>,
}

impl PipelineExecutor {
    pub fn new(config: ProvisionConfig) -> Self {
        let runner = Arc::new(SpawnRunner::new(config.tail_lines));
        Self {
            config,
            transforms: TransformStage::default(),
            stack_namer: Box::new(DefaultStackNames),
            token: None,
            runner,
        }
    }

    pub fn with_transform(mut self, spec: TransformSpec) -> Self {
        self.transforms.push(spec);
        self
    }

    pub fn with_stack_namer(mut self, namer: impl StackNamer + 'static) -> Self {
        self.stack_namer = Box::new(namer);
        self
    }

    /// Per-run token; takes precedence over `provision.token`.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn goal(&self, environment: &EnvironmentTag) -> GoalDetails {
        GoalDetails::for_environment(&self.config.tool, environment.clone())
    }

    pub fn stack_name(&self, ctx: &ExecutionContext) -> String {
        self.stack_namer.stack_name(ctx)
    }

    fn resolve_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.config.configured_token())
    }

    /// Run every stage against `tree`. Failures come back as a failing
    /// [`PipelineResult`], never as a panic or an `Err`.
    pub async fn run(
        &self,
        ctx: &ExecutionContext,
        tree: &mut dyn WorkingTree,
        log: &mut dyn ProgressLog,
    ) -> PipelineResult {
        let goal = self.goal(&ctx.environment);
        let span = tracing::info_span!(
            "pipeline",
            run_id = %ctx.run_id,
            repo = %ctx.repo.slug(),
            environment = %ctx.environment,
        );

        log.write(&goal.working_description);

        match self.execute(ctx, tree, log).instrument(span).await {
            Ok(external_urls) => {
                log.write(&goal.completed_description);
                tracing::info!(run_id = %ctx.run_id, "pipeline succeeded");
                PipelineResult::success(external_urls)
            }
            Err(err) => {
                let result = PipelineResult::from_error(err, &goal);
                if let Some(failure) = result.failure() {
                    log.write(&failure.description);
                    tracing::warn!(
                        run_id = %ctx.run_id,
                        code = failure.code,
                        kind = %failure.kind,
                        "pipeline failed"
                    );
                }
                result
            }
        }
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        tree: &mut dyn WorkingTree,
        log: &mut dyn ProgressLog,
    ) -> Result<Vec<ExternalUrl>> {
        if !self.transforms.is_empty() {
            let report = self.transforms.apply(tree, ctx, log)?;
            tracing::info!(
                stage = "transform",
                applied = report.applied.len(),
                skipped = report.skipped.len(),
                "transforms done"
            );
        }

        ManifestGate::new(&self.config).check(&*tree, log)?;

        let cwd = tree.base_dir().join(&self.config.manifest_dir);

        let install = ProcessStep::new(&self.config.package_manager, ["install"]);
        log.write(&format!("Running '{}'", install.label()));
        tracing::info!(stage = "install", cwd = %cwd.display(), "running");
        install.run(self.runner.as_ref(), &cwd, log).await?;

        let stack = self.stack_name(ctx);

        let token = match self.resolve_token() {
            Some(token) => token.to_string(),
            None => {
                log.write(&format!("No access token in '{}'", TOKEN_KEY));
                return Err(Error::config_missing_token(TOKEN_KEY));
            }
        };

        let provision = ProcessStep::new(
            &self.config.tool,
            ["up", "--non-interactive", "--stack", stack.as_str()],
        )
        .with_label(format!("{} up", self.config.tool))
        .with_env(EnvOverlay::new().with(&self.config.token_env, token));

        log.write(&format!(
            "Running '{}' for stack '{}'",
            provision.label(),
            stack
        ));
        tracing::info!(stage = "provision", %stack, "running");

        let mut capture = OutputCapture::new(log);
        provision
            .run(self.runner.as_ref(), &cwd, &mut capture)
            .await?;
        let output = capture.drain();

        let link = permalink::external_url(&output)?;
        Ok(vec![link])
    }
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("config", &self.config.manifest_path())
            .field("transforms", &self.transforms.len())
            .field("token", &self.token.as_ref().map(|_| "<set>"))
            .finish()
    }
}
