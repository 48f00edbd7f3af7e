use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use stackup::context::{EnvironmentTag, ExecutionContext, RepoRef};
use stackup::defaults::ProvisionConfig;
use stackup::logs::{MemoryLog, ProgressLog};
use stackup::process::{CommandSpec, ProcessOutcome, ProcessRunner};
use stackup::stack::FixedStack;
use stackup::transform::{AddFile, TransformSpec};
use stackup::tree::{LocalTree, WorkingTree};
use stackup::{ErrorCode, ExternalUrl, PipelineExecutor};

const MANIFEST: &str = "name: api\nruntime: nodejs\n";

/// Replays canned output per program and records every invocation.
#[derive(Default)]
struct ScriptedRunner {
    scripts: HashMap<String, (i32, Vec<String>)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    fn new() -> Self {
        Self::default()
    }

    fn script(mut self, program: &str, exit_code: i32, lines: &[&str]) -> Self {
        self.scripts.insert(
            program.to_string(),
            (exit_code, lines.iter().map(|l| l.to_string()).collect()),
        );
        self
    }

    fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec, log: &mut dyn ProgressLog) -> ProcessOutcome {
        self.calls.lock().unwrap().push(spec.clone());

        let (exit_code, lines) = self
            .scripts
            .get(&spec.program)
            .cloned()
            .unwrap_or((0, Vec::new()));
        for line in &lines {
            log.write(line);
        }

        ProcessOutcome {
            exit_code,
            captured_tail: lines.join("\n"),
            description: format!("'{}' exited with code {}", spec.display(), exit_code),
        }
    }
}

fn tree_with_manifest() -> (TempDir, LocalTree) {
    let dir = TempDir::new().unwrap();
    let mut tree = LocalTree::new(dir.path()).unwrap();
    tree.add_file(".pulumi/Pulumi.yaml", MANIFEST).unwrap();
    (dir, tree)
}

fn context(env: EnvironmentTag) -> ExecutionContext {
    ExecutionContext::new(RepoRef::new("api"), env)
}

fn executor(runner: &Arc<ScriptedRunner>) -> PipelineExecutor {
    PipelineExecutor::new(ProvisionConfig::default())
        .with_runner(runner.clone())
        .with_token("tok-123")
}

#[tokio::test]
async fn missing_manifest_fails_without_spawning() {
    let dir = TempDir::new().unwrap();
    let mut tree = LocalTree::new(dir.path()).unwrap();
    let runner = Arc::new(ScriptedRunner::new());
    let mut log = MemoryLog::new();

    let result = executor(&runner)
        .run(&context(EnvironmentTag::Staging), &mut tree, &mut log)
        .await;

    assert_eq!(result.code(), 1);
    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, ErrorCode::ManifestMissing);
    assert_eq!(
        failure.description,
        "pulumi up `testing` failed (no application found)"
    );
    assert!(runner.calls().is_empty());
    assert!(log.contains("No application found in project"));
}

#[tokio::test]
async fn failed_install_stops_before_provisioning() {
    let (_dir, mut tree) = tree_with_manifest();
    let runner = Arc::new(
        ScriptedRunner::new()
            .script("npm", 2, &["npm ERR! code ERESOLVE"])
            .script("pulumi", 0, &["Permalink: https://stack.example/up/1"]),
    );
    let mut log = MemoryLog::new();

    let result = executor(&runner)
        .run(&context(EnvironmentTag::Production), &mut tree, &mut log)
        .await;

    assert_eq!(result.code(), 2);
    assert_eq!(result.failure().unwrap().kind, ErrorCode::ProcessFailed);
    assert_eq!(
        result.failure().unwrap().details["tail"],
        "npm ERR! code ERESOLVE"
    );
    assert_eq!(runner.programs(), vec!["npm".to_string()]);
    assert!(log.contains("Running 'npm install'"));
}

#[tokio::test]
async fn successful_run_reports_permalink() {
    let (dir, mut tree) = tree_with_manifest();
    let runner = Arc::new(ScriptedRunner::new().script(
        "pulumi",
        0,
        &[
            "Updating (acme/api-testing)",
            "Resources:",
            "    4 unchanged",
            "Permalink: https://stack.example/up/7",
        ],
    ));
    let mut log = MemoryLog::new();

    let result = executor(&runner)
        .run(&context(EnvironmentTag::Staging), &mut tree, &mut log)
        .await;

    assert!(result.is_success());
    assert_eq!(result.code(), 0);
    assert_eq!(
        result.external_urls(),
        &[ExternalUrl::new("Permalink", "https://stack.example/up/7")]
    );

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);

    let cwd = dir.path().join(".pulumi");
    assert_eq!(calls[0].program, "npm");
    assert_eq!(calls[0].args, vec!["install".to_string()]);
    assert_eq!(calls[0].cwd, cwd);
    assert!(calls[0].env.is_empty());

    assert_eq!(calls[1].program, "pulumi");
    assert_eq!(
        calls[1].args,
        vec!["up", "--non-interactive", "--stack", "api-testing"]
    );
    assert_eq!(calls[1].cwd, cwd);
    assert_eq!(calls[1].env.get("PULUMI_ACCESS_TOKEN"), Some("tok-123"));

    assert!(log.contains("Project has application in '.pulumi' directory"));
    assert!(log.contains("Running 'pulumi up' for stack 'api-testing'"));
    assert!(log.contains("Permalink: https://stack.example/up/7"));
    assert!(log.contains("pulumi up `testing` completed"));

    let payload = serde_json::to_value(result.payload()).unwrap();
    assert_eq!(
        payload,
        serde_json::json!({
            "code": 0,
            "externalUrls": [{ "label": "Permalink", "url": "https://stack.example/up/7" }]
        })
    );
}

#[tokio::test]
async fn missing_token_halts_before_provisioning() {
    let (_dir, mut tree) = tree_with_manifest();
    let runner = Arc::new(ScriptedRunner::new());
    let mut log = MemoryLog::new();

    let result = PipelineExecutor::new(ProvisionConfig::default())
        .with_runner(runner.clone())
        .run(&context(EnvironmentTag::Independent), &mut tree, &mut log)
        .await;

    assert_eq!(result.code(), 1);
    assert_eq!(result.failure().unwrap().kind, ErrorCode::ConfigMissingToken);
    assert_eq!(runner.programs(), vec!["npm".to_string()]);
    assert!(log.contains("No access token in 'provision.token'"));
}

#[tokio::test]
async fn configured_token_is_the_fallback() {
    let (_dir, mut tree) = tree_with_manifest();
    let runner = Arc::new(
        ScriptedRunner::new().script("pulumi", 0, &["Permalink: https://stack.example/up/2"]),
    );
    let config = ProvisionConfig {
        token: Some("from-config".to_string()),
        ..ProvisionConfig::default()
    };

    let result = PipelineExecutor::new(config)
        .with_runner(runner.clone())
        .run(&context(EnvironmentTag::Independent), &mut tree, &mut MemoryLog::new())
        .await;

    assert!(result.is_success());
    let calls = runner.calls();
    assert_eq!(calls[1].env.get("PULUMI_ACCESS_TOKEN"), Some("from-config"));
    assert_eq!(calls[1].args.last().map(String::as_str), Some("api"));
}

#[tokio::test]
async fn zero_exit_without_permalink_is_a_failure() {
    let (_dir, mut tree) = tree_with_manifest();
    let runner = Arc::new(
        ScriptedRunner::new().script("pulumi", 0, &["Updating (api)", "Resources: 2 created"]),
    );

    let result = executor(&runner)
        .run(&context(EnvironmentTag::Independent), &mut tree, &mut MemoryLog::new())
        .await;

    assert!(!result.is_success());
    assert_eq!(result.code(), 1);
    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, ErrorCode::PermalinkNotFound);
    assert!(failure.description.contains("Permalink"));
}

#[tokio::test]
async fn provisioning_exit_code_is_kept() {
    let (_dir, mut tree) = tree_with_manifest();
    let runner = Arc::new(ScriptedRunner::new().script(
        "pulumi",
        255,
        &["error: update failed", "Permalink: https://stack.example/up/9"],
    ));

    let result = executor(&runner)
        .run(&context(EnvironmentTag::Production), &mut tree, &mut MemoryLog::new())
        .await;

    assert_eq!(result.code(), 255);
    assert!(result.external_urls().is_empty());
    assert_eq!(
        result.failure().unwrap().description,
        "pulumi up `production` failed \
         ('pulumi up --non-interactive --stack api-production' exited with code 255)"
    );
}

#[tokio::test]
async fn install_output_is_not_scanned_for_permalink() {
    let (_dir, mut tree) = tree_with_manifest();
    let runner = Arc::new(
        ScriptedRunner::new()
            .script("npm", 0, &["Permalink: https://stack.example/from-install"])
            .script("pulumi", 0, &["Updating (api)", "Resources: 1 unchanged"]),
    );
    let mut log = MemoryLog::new();

    let result = executor(&runner)
        .run(&context(EnvironmentTag::Independent), &mut tree, &mut log)
        .await;

    assert!(!result.is_success());
    assert_eq!(result.code(), 1);
    assert_eq!(result.failure().unwrap().kind, ErrorCode::PermalinkNotFound);
    assert!(log.contains("Permalink: https://stack.example/from-install"));
    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn missing_install_program_is_described() {
    let (_dir, mut tree) = tree_with_manifest();
    let config = ProvisionConfig {
        package_manager: "stackup-no-such-npm".to_string(),
        ..ProvisionConfig::default()
    };

    let result = PipelineExecutor::new(config)
        .with_token("tok-123")
        .run(&context(EnvironmentTag::Staging), &mut tree, &mut MemoryLog::new())
        .await;

    assert_eq!(result.code(), -1);
    let failure = result.failure().unwrap();
    assert_eq!(failure.kind, ErrorCode::ProcessFailed);
    assert!(failure
        .description
        .starts_with("pulumi up `testing` failed (Failed to run 'stackup-no-such-npm install'"));
}

#[tokio::test]
async fn transforms_run_before_the_gate() {
    let dir = TempDir::new().unwrap();
    let mut tree = LocalTree::new(dir.path()).unwrap();
    let runner = Arc::new(
        ScriptedRunner::new().script("pulumi", 0, &["Permalink: https://stack.example/up/3"]),
    );
    let mut log = MemoryLog::new();

    let result = executor(&runner)
        .with_transform(TransformSpec::always(AddFile::new(
            ".pulumi/Pulumi.yaml",
            MANIFEST,
        )))
        .with_transform(TransformSpec::when(
            AddFile::new("PRODUCTION", "1"),
            |ctx: &ExecutionContext| ctx.environment == EnvironmentTag::Production,
        ))
        .run(&context(EnvironmentTag::Staging), &mut tree, &mut log)
        .await;

    assert!(result.is_success());
    assert!(tree.has_file(".pulumi/Pulumi.yaml"));
    assert!(!tree.has_file("PRODUCTION"));
    assert!(log.contains("Running code transform 'add .pulumi/Pulumi.yaml'"));
}

#[tokio::test]
async fn failing_transform_spawns_nothing() {
    let (_dir, mut tree) = tree_with_manifest();
    let runner = Arc::new(ScriptedRunner::new());

    let result = executor(&runner)
        .with_transform(TransformSpec::always(AddFile::new("../escape", "x")))
        .run(&context(EnvironmentTag::Independent), &mut tree, &mut MemoryLog::new())
        .await;

    assert_eq!(result.code(), 1);
    assert_eq!(result.failure().unwrap().kind, ErrorCode::TransformFailed);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn stack_override_is_used() {
    let (_dir, mut tree) = tree_with_manifest();
    let runner = Arc::new(
        ScriptedRunner::new().script("pulumi", 0, &["Permalink: https://stack.example/up/4"]),
    );

    let result = executor(&runner)
        .with_stack_namer(FixedStack("acme/shared".to_string()))
        .run(
            &context(EnvironmentTag::Custom("42-preview".to_string())),
            &mut tree,
            &mut MemoryLog::new(),
        )
        .await;

    assert!(result.is_success());
    assert_eq!(runner.calls()[1].args[3], "acme/shared");
}

#[tokio::test]
async fn independent_runs_do_not_interfere() {
    let (_a_dir, mut a_tree) = tree_with_manifest();
    let (_b_dir, mut b_tree) = tree_with_manifest();
    let runner = Arc::new(
        ScriptedRunner::new().script("pulumi", 0, &["Permalink: https://stack.example/up/5"]),
    );
    let executor = executor(&runner);
    let staging = context(EnvironmentTag::Staging);
    let production = context(EnvironmentTag::Production);
    let mut a_log = MemoryLog::new();
    let mut b_log = MemoryLog::new();

    let (a, b) = tokio::join!(
        executor.run(&staging, &mut a_tree, &mut a_log),
        executor.run(&production, &mut b_tree, &mut b_log),
    );

    assert!(a.is_success());
    assert!(b.is_success());
    assert!(a_log.contains("for stack 'api-testing'"));
    assert!(!a_log.contains("api-production"));
    assert!(b_log.contains("for stack 'api-production'"));
    assert_eq!(runner.calls().len(), 4);
}

/// Real processes: `sh <script>` stands in for both tools, with the scripts
/// living in the manifest directory.
#[cfg(unix)]
mod spawned {
    use super::*;

    fn sh_config() -> ProvisionConfig {
        ProvisionConfig {
            package_manager: "sh".to_string(),
            tool: "sh".to_string(),
            token_env: "STACKUP_E2E_TOKEN".to_string(),
            ..ProvisionConfig::default()
        }
    }

    #[tokio::test]
    async fn end_to_end_with_shell_scripts() {
        let (_dir, mut tree) = tree_with_manifest();
        tree.add_file(".pulumi/install", "echo installing deps\necho warn >&2\n")
            .unwrap();
        // `sh up --non-interactive --stack <name>` runs ./up with the rest as $1..$3
        tree.add_file(
            ".pulumi/up",
            "echo \"Updating ($3)\"\n\
             echo \"token=$STACKUP_E2E_TOKEN\"\n\
             echo \"Permalink: https://stack.example/up/7\"\n",
        )
        .unwrap();
        let mut log = MemoryLog::new();

        let result = PipelineExecutor::new(sh_config())
            .with_token("e2e-secret")
            .run(&context(EnvironmentTag::Staging), &mut tree, &mut log)
            .await;

        assert!(result.is_success(), "{:?}", result);
        assert_eq!(
            result.external_urls(),
            &[ExternalUrl::new("Permalink", "https://stack.example/up/7")]
        );
        assert!(log.contains("installing deps"));
        assert!(log.contains("warn"));
        assert!(log.contains("Updating (api-testing)"));
        assert!(log.contains("token=e2e-secret"));
    }

    #[tokio::test]
    async fn end_to_end_install_failure() {
        let (_dir, mut tree) = tree_with_manifest();
        tree.add_file(".pulumi/install", "echo broken lockfile\nexit 2\n")
            .unwrap();
        tree.add_file(".pulumi/up", "touch provisioned\n").unwrap();

        let result = PipelineExecutor::new(sh_config())
            .with_token("e2e-secret")
            .run(&context(EnvironmentTag::Independent), &mut tree, &mut MemoryLog::new())
            .await;

        assert_eq!(result.code(), 2);
        assert!(result.failure().unwrap().details["tail"]
            .as_str()
            .unwrap()
            .contains("broken lockfile"));
        assert!(!tree.has_file(".pulumi/provisioned"));
    }
}
