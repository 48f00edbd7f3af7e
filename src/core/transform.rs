//! Conditional working-tree mutations applied before anything is spawned.
//!
//! Entries run in list order. A failing mutation aborts the stage and leaves
//! whatever earlier entries wrote in place; there is no rollback.

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::logs::ProgressLog;
use crate::tree::WorkingTree;

/// A mutation of the working tree.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, tree: &mut dyn WorkingTree, ctx: &ExecutionContext) -> Result<()>;
}

/// Predicate deciding whether a transform runs for this change.
pub trait PushTest: Send + Sync {
    fn test(&self, ctx: &ExecutionContext) -> bool;
}

impl<F> PushTest for F
where
    F: Fn(&ExecutionContext) -> bool + Send + Sync,
{
    fn test(&self, ctx: &ExecutionContext) -> bool {
        self(ctx)
    }
}

pub struct TransformSpec {
    transform: Box<dyn Transform>,
    predicate: Option<Box<dyn PushTest>>,
}

impl TransformSpec {
    pub fn always(transform: impl Transform + 'static) -> Self {
        Self {
            transform: Box::new(transform),
            predicate: None,
        }
    }

    pub fn when(transform: impl Transform + 'static, predicate: impl PushTest + 'static) -> Self {
        Self {
            transform: Box::new(transform),
            predicate: Some(Box::new(predicate)),
        }
    }

    pub fn name(&self) -> &str {
        self.transform.name()
    }

    fn should_run(&self, ctx: &ExecutionContext) -> bool {
        self.predicate.as_ref().map_or(true, |p| p.test(ctx))
    }
}

impl std::fmt::Debug for TransformSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformSpec")
            .field("transform", &self.transform.name())
            .field("conditional", &self.predicate.is_some())
            .finish()
    }
}

/// Names of the transforms that ran and that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Default)]
pub struct TransformStage {
    specs: Vec<TransformSpec>,
}

impl TransformStage {
    pub fn new(specs: Vec<TransformSpec>) -> Self {
        Self { specs }
    }

    pub fn push(&mut self, spec: TransformSpec) {
        self.specs.push(spec);
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn apply(
        &self,
        tree: &mut dyn WorkingTree,
        ctx: &ExecutionContext,
        log: &mut dyn ProgressLog,
    ) -> Result<TransformReport> {
        let mut report = TransformReport::default();

        for spec in &self.specs {
            let name = spec.name().to_string();

            if !spec.should_run(ctx) {
                tracing::debug!(transform = %name, "predicate false, skipping");
                report.skipped.push(name);
                continue;
            }

            log.write(&format!("Running code transform '{}'", name));
            spec.transform
                .apply(tree, ctx)
                .map_err(|e| Error::transform_failed(&name, e.message))?;
            report.applied.push(name);
        }

        Ok(report)
    }
}

/// Writes one file into the tree, replacing any existing content.
#[derive(Debug, Clone)]
pub struct AddFile {
    name: String,
    path: String,
    contents: String,
}

impl AddFile {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: format!("add {}", path),
            path,
            contents: contents.into(),
        }
    }
}

impl Transform for AddFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, tree: &mut dyn WorkingTree, _ctx: &ExecutionContext) -> Result<()> {
        tree.add_file(&self.path, &self.contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EnvironmentTag, RepoRef};
    use crate::error::ErrorCode;
    use crate::logs::MemoryLog;
    use crate::tree::LocalTree;
    use tempfile::TempDir;

    fn context(env: EnvironmentTag) -> ExecutionContext {
        ExecutionContext::new(RepoRef::new("api"), env)
    }

    #[test]
    fn false_predicate_skips_only_its_entry() {
        let dir = TempDir::new().unwrap();
        let mut tree = LocalTree::new(dir.path()).unwrap();
        let stage = TransformStage::new(vec![
            TransformSpec::when(AddFile::new("prod-only.txt", "x"), |ctx: &ExecutionContext| {
                ctx.environment == EnvironmentTag::Production
            }),
            TransformSpec::always(AddFile::new("always.txt", "y")),
        ]);
        let mut log = MemoryLog::new();

        let report = stage
            .apply(&mut tree, &context(EnvironmentTag::Staging), &mut log)
            .unwrap();

        assert!(!tree.has_file("prod-only.txt"));
        assert!(tree.has_file("always.txt"));
        assert_eq!(report.applied, vec!["add always.txt".to_string()]);
        assert_eq!(report.skipped, vec!["add prod-only.txt".to_string()]);
        assert!(log.contains("Running code transform 'add always.txt'"));
    }

    #[test]
    fn true_predicate_runs() {
        let dir = TempDir::new().unwrap();
        let mut tree = LocalTree::new(dir.path()).unwrap();
        let stage = TransformStage::new(vec![TransformSpec::when(
            AddFile::new("prod-only.txt", "x"),
            |ctx: &ExecutionContext| ctx.environment == EnvironmentTag::Production,
        )]);

        stage
            .apply(&mut tree, &context(EnvironmentTag::Production), &mut MemoryLog::new())
            .unwrap();

        assert!(tree.has_file("prod-only.txt"));
    }

    #[test]
    fn failure_aborts_remaining_entries() {
        let dir = TempDir::new().unwrap();
        let mut tree = LocalTree::new(dir.path()).unwrap();
        let stage = TransformStage::new(vec![
            TransformSpec::always(AddFile::new("first.txt", "1")),
            TransformSpec::always(AddFile::new("../outside.txt", "2")),
            TransformSpec::always(AddFile::new("third.txt", "3")),
        ]);

        let err = stage
            .apply(&mut tree, &context(EnvironmentTag::Independent), &mut MemoryLog::new())
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::TransformFailed);
        assert_eq!(err.details["transform"], "add ../outside.txt");
        assert!(tree.has_file("first.txt"));
        assert!(!tree.has_file("third.txt"));
    }

    #[test]
    fn empty_stage_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let mut tree = LocalTree::new(dir.path()).unwrap();
        let report = TransformStage::default()
            .apply(&mut tree, &context(EnvironmentTag::Independent), &mut MemoryLog::new())
            .unwrap();
        assert_eq!(report, TransformReport::default());
    }
}
