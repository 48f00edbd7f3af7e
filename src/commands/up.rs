use chrono::Utc;
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use stackup::context::{EnvironmentTag, ExecutionContext, RepoRef};
use stackup::goal::GoalDetails;
use stackup::logs::ConsoleLog;
use stackup::output::{PipelineFailure, ResultPayload};
use stackup::stack::FixedStack;
use stackup::tree::{LocalTree, WorkingTree};
use stackup::{defaults, log_status, Error, PipelineExecutor};

use super::CmdResult;

#[derive(Args)]
pub struct UpArgs {
    /// Path to the checked-out working tree
    pub path: String,

    /// Repository name (defaults to the directory name)
    #[arg(long)]
    pub repo: Option<String>,

    /// Repository owner
    #[arg(long)]
    pub owner: Option<String>,

    /// Branch the change was pushed to
    #[arg(long)]
    pub branch: Option<String>,

    /// Commit the tree was checked out at
    #[arg(long)]
    pub sha: Option<String>,

    /// Environment tag (independent, staging, production or <n>-<suffix>)
    #[arg(long, default_value = "independent")]
    pub env: String,

    /// Access token for the provisioning tool (overrides provision.token)
    #[arg(long)]
    pub token: Option<String>,

    /// Stack name, replacing the environment-derived one
    #[arg(long)]
    pub stack: Option<String>,

    /// Container image built for the change
    #[arg(long)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpOutput {
    command: String,
    run_id: Uuid,
    goal: GoalDetails,
    stack: String,
    started_at: String,
    finished_at: String,
    result: ResultPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<PipelineFailure>,
}

pub fn run(args: UpArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<UpOutput> {
    let environment: EnvironmentTag = args.env.parse()?;

    let path = shellexpand::tilde(&args.path).to_string();
    let mut tree = LocalTree::new(&path)?;

    let name = args
        .repo
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| tree.name().to_string());
    if name.is_empty() {
        return Err(Error::validation_missing_argument(vec!["--repo".to_string()]));
    }

    let repo = RepoRef {
        owner: args.owner,
        name,
        branch: args.branch,
        sha: args.sha,
    };
    let mut ctx = ExecutionContext::new(repo, environment);
    if let Some(image) = args.image {
        ctx = ctx.with_image(image);
    }

    let mut executor = PipelineExecutor::new(defaults::load_config().provision);
    if let Some(token) = args.token {
        executor = executor.with_token(token);
    }
    if let Some(stack) = args.stack.filter(|s| !s.trim().is_empty()) {
        executor = executor.with_stack_namer(FixedStack(stack));
    }

    let goal = executor.goal(&ctx.environment);
    let stack = executor.stack_name(&ctx);
    log_status!("up", "{} (stack '{}')", goal.working_description, stack);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::internal_io(e.to_string(), Some("start async runtime".to_string())))?;

    let started_at = Utc::now().to_rfc3339();
    let mut log = ConsoleLog::default();
    let result = runtime.block_on(executor.run(&ctx, &mut tree, &mut log));

    // Spawn failures report -1; the shell still has to see a failure.
    let exit_code = match result.code() {
        code if result.is_success() => code,
        code if code > 0 => code,
        _ => 1,
    };

    Ok((
        UpOutput {
            command: "up".to_string(),
            run_id: ctx.run_id,
            goal,
            stack,
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            result: result.payload(),
            error: result.failure().cloned(),
        },
        exit_code,
    ))
}
