//! Workflow execution: the linear pipeline turning (repository, ref pair,
//! workflow configuration) into a cached, reproducible LLM interaction.
//!
//! Stages run strictly in order; the provider call is the dominant
//! blocking operation. Explicitly designed degradations aside (branch
//! listing, cache checks, context assembly), every failure surfaces as a
//! typed [`WorkflowError`].

pub mod artifacts;
mod config;

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

pub use config::{OutputFormat, WorkflowConfig};

use crate::config::{AppConfig, ConfigError};
use crate::constants::{CHARS_PER_TOKEN, CONTEXT_LIMIT};
use crate::env::Env;
use crate::git::{self, GitError, RefPair, TierLimits};
use crate::prompt::{self, PromptContext, RenderError};
use crate::providers::{CallOptions, ProviderError, ProviderRegistry, ToolAccess};
use crate::security;
use crate::store::{CacheStore, ContextEntry, EntryType, NewEntry};

/// Errors from workflow execution.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("not a git repository: {path}")]
    Repository { path: PathBuf },

    #[error("failed to generate diff: {0}")]
    Diff(#[source] GitError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("failed to write artifacts: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal outcome of a workflow run. All three variants are successes.
#[derive(Debug)]
pub enum WorkflowOutcome {
    /// The diff was empty — reported before any LLM cost is incurred.
    NoChanges,
    /// Dry run: the prompt was rendered and persisted, the provider and
    /// the cache store were never touched.
    DryRun {
        output_dir: PathBuf,
        estimated_tokens: usize,
    },
    /// A response was produced (or replayed from cache) and persisted.
    Completed {
        output_dir: PathBuf,
        response: String,
        cached: bool,
        /// Manual-mode delivery: the prompt went to the clipboard and no
        /// programmatic response exists.
        manual: bool,
    },
}

/// The top-level coordinator.
pub struct WorkflowExecutor {
    app: AppConfig,
    registry: ProviderRegistry,
    env: Env,
}

impl WorkflowExecutor {
    pub fn new(app: AppConfig) -> Self {
        Self::with_registry(app, ProviderRegistry::with_builtins())
    }

    /// Construct with a custom registry (tests inject mock providers).
    pub fn with_registry(app: AppConfig, registry: ProviderRegistry) -> Self {
        Self {
            app,
            registry,
            env: Env::real(),
        }
    }

    /// Execute the complete workflow for one request.
    pub async fn run(&self, request: WorkflowConfig) -> Result<WorkflowOutcome, WorkflowError> {
        // 1. Load configuration — returns a new immutable config.
        let config = self.load(&request)?;
        info!(
            "target: {} ({})",
            config.repo_name,
            config.repo_path.display()
        );
        info!(
            "workflow: {} ({})",
            config.workflow_name(),
            if config.dry_run { "DRY RUN" } else { "LIVE" }
        );

        // 2. Validate repository state.
        self.validate_repository(&config).await?;

        // 3. Resolve refs.
        let refs = git::determine_refs(
            config.target_ref.as_deref(),
            config.source_ref.as_deref(),
            config.commit.as_deref(),
            &config.remote,
            &config.main_branch,
        );
        info!("generating git diff: {refs}");

        // 4. Generate diff, with one-shot token pruning.
        let diff = self.generate_diff(&config, &refs).await?;
        if diff.trim().is_empty() {
            info!("no changes detected — skipping LLM call");
            return Ok(WorkflowOutcome::NoChanges);
        }

        match git::changed_files(&config.repo_path, &refs).await {
            Ok(files) => info!("{} file(s) changed", files.len()),
            Err(e) => warn!("could not list changed files: {e}"),
        }

        // 5. Secret scanning — advisory, never a gate.
        let findings = security::scan_for_secrets(&diff);
        if !findings.is_empty() {
            warn!(
                "{} potential secret(s) detected in diff — review before sharing",
                findings.len()
            );
        }

        // 6. Assemble context. Each source degrades independently.
        let store = self.open_store();
        let history = git::commits_between(
            &config.repo_path,
            &refs.target,
            refs.source_label(),
            TierLimits::default(),
        )
        .await;
        let context = self.load_context(store.as_ref(), &config.repo_name);

        // 7. Build both prompt renderings.
        let output_dir = artifacts::execution_dir(
            &self.app.output.dir,
            &config.repo_name,
            config.workflow_name(),
        );
        let languages = match &config.language {
            Some(lang) => vec![lang.clone()],
            None => prompt::detect_languages(&diff),
        };
        let ctx = PromptContext {
            diff: diff.clone(),
            repo_name: config.repo_name.clone(),
            primary_language: languages.first().cloned().unwrap_or_else(|| "text".to_string()),
            languages,
            answer_language: self.app.languages.answer.clone(),
            comment_language: self.app.languages.comment.clone(),
            output_format: config.output_format.to_string(),
            output_dir: output_dir.display().to_string(),
            context,
            commit_history: history,
            target_ref: refs.target.clone(),
            source_ref: refs.source_label().to_string(),
        };
        let template_path = self.template_path(&config)?;
        let prompts = prompt::build_prompt_with_context(&template_path, &ctx, self.app.render.strict)?;

        // 8. Content-addressed cache key inputs.
        let diff_hash = prompt::content_hash(&diff);
        let prompt_hash = prompt::content_hash(&prompts.base);

        // Dry run intercepts here: no cache, no provider.
        if config.dry_run {
            let estimated_tokens = prompts.full.len() / CHARS_PER_TOKEN;
            artifacts::write_prompt_artifact(&output_dir, &prompts.full)?;
            info!("dry run: prompt rendered, ~{estimated_tokens} tokens");
            return Ok(WorkflowOutcome::DryRun {
                output_dir,
                estimated_tokens,
            });
        }

        // 9. Resolve provider and model.
        let spec = config.workflow_spec.as_ref();
        let provider_name = config
            .provider
            .as_deref()
            .or(spec.and_then(|s| s.provider.as_deref()))
            .unwrap_or(&self.app.provider.name);
        let provider = self.registry.get(provider_name)?;
        let model = config
            .model
            .clone()
            .or_else(|| spec.and_then(|s| s.model.clone()))
            .or_else(|| self.app.provider.model.clone())
            .unwrap_or_else(|| provider.default_model().to_string());

        // 10. Cache check — a failing check degrades to a miss.
        if let Some(cached) = self.check_cache(store.as_ref(), &diff_hash, &prompt_hash, &model) {
            info!("cache hit — returning stored response");
            artifacts::write_run_artifacts(&output_dir, &diff, &prompts)?;
            artifacts::write_response(&output_dir, config.output_format, &cached)?;
            return Ok(WorkflowOutcome::Completed {
                output_dir,
                response: cached,
                cached: true,
                manual: false,
            });
        }

        // 11. Invoke the provider.
        if !provider.is_available().await {
            return Err(ProviderError::NotInstalled(format!(
                "provider '{provider_name}' is not available — check installation and authentication"
            ))
            .into());
        }
        info!("calling {provider_name} ({model})");
        let opts = CallOptions {
            model: Some(model.clone()),
            tools: tool_access_for(config.workflow_name()),
            ..CallOptions::default()
        };
        let response = provider.call(&prompts.full, &opts).await?;

        // 12. Persist artifacts and the cache entry. An empty response is
        // a manual-mode delivery: terminal and non-cacheable.
        artifacts::write_run_artifacts(&output_dir, &diff, &prompts)?;
        artifacts::write_response(&output_dir, config.output_format, &response)?;
        info!("artifacts saved to {}", output_dir.display());

        let manual = response.is_empty();
        if !manual {
            self.save_cache(
                store.as_ref(),
                &config,
                &diff_hash,
                &prompt_hash,
                &model,
                &response,
            );
        }

        Ok(WorkflowOutcome::Completed {
            output_dir,
            response,
            cached: false,
            manual,
        })
    }

    /// Load repository setup and produce the enriched config.
    fn load(&self, request: &WorkflowConfig) -> Result<WorkflowConfig, WorkflowError> {
        let repos_dir = self.app.repos_dir();
        let setup = crate::config::load_repo_setup(&repos_dir, &request.repo_name)?;
        let (workflow, spec) = setup.resolve_workflow(&request.repo_name, request.workflow.as_deref())?;
        Ok(request.with_loaded(workflow, &setup, spec.clone()))
    }

    async fn validate_repository(&self, config: &WorkflowConfig) -> Result<(), WorkflowError> {
        if !git::is_valid_repository(&config.repo_path).await {
            return Err(WorkflowError::Repository {
                path: config.repo_path.clone(),
            });
        }

        // Warn only — analyzing work-in-progress is legitimate.
        match git::is_clean_working_directory(&config.repo_path).await {
            Ok((true, _)) => {}
            Ok((false, status)) => warn!("uncommitted changes detected:\n{status}"),
            Err(e) => warn!("could not check working directory state: {e}"),
        }
        Ok(())
    }

    /// Generate the diff; if it blows the token budget, downgrade once to
    /// a `--stat` summary.
    async fn generate_diff(
        &self,
        config: &WorkflowConfig,
        refs: &RefPair,
    ) -> Result<String, WorkflowError> {
        let diff = git::get_diff(&config.repo_path, refs, false)
            .await
            .map_err(WorkflowError::Diff)?;

        if let Some(token_limit) = config.token_limit {
            let estimated = diff.len() / CHARS_PER_TOKEN;
            if estimated > token_limit {
                warn!(
                    "diff too large (~{estimated} tokens > {token_limit} limit) — pruning to --stat summary"
                );
                return git::get_diff(&config.repo_path, refs, true)
                    .await
                    .map_err(WorkflowError::Diff);
            }
        }
        Ok(diff)
    }

    /// Open the history store; failures degrade to running without one.
    fn open_store(&self) -> Option<CacheStore> {
        let path = match &self.app.db_path {
            Some(path) => path.clone(),
            None => match CacheStore::default_path(&self.env) {
                Ok(path) => path,
                Err(e) => {
                    warn!("history store unavailable: {e}");
                    return None;
                }
            },
        };
        match CacheStore::open(&path) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("history store unavailable, proceeding without cache: {e}");
                None
            }
        }
    }

    fn load_context(&self, store: Option<&CacheStore>, repo_name: &str) -> Vec<ContextEntry> {
        let Some(store) = store else {
            return vec![ContextEntry::no_history()];
        };
        match store.get_context(repo_name, CONTEXT_LIMIT, None) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("failed to load context history: {e}");
                vec![ContextEntry::no_history()]
            }
        }
    }

    fn check_cache(
        &self,
        store: Option<&CacheStore>,
        diff_hash: &str,
        prompt_hash: &str,
        model: &str,
    ) -> Option<String> {
        match store?.get_cache(diff_hash, prompt_hash, model) {
            Ok(hit) => hit,
            Err(e) => {
                warn!("cache check failed, proceeding without cache: {e}");
                None
            }
        }
    }

    fn save_cache(
        &self,
        store: Option<&CacheStore>,
        config: &WorkflowConfig,
        diff_hash: &str,
        prompt_hash: &str,
        model: &str,
        response: &str,
    ) {
        let Some(store) = store else {
            return;
        };
        let entry = NewEntry {
            diff_hash: diff_hash.to_string(),
            prompt_hash: prompt_hash.to_string(),
            model: model.to_string(),
            response: response.to_string(),
            cost: None,
            repo_name: config.repo_name.clone(),
            summary: summarize(response),
            tags: config.workflow_name().to_string(),
            entry_type: EntryType::Review,
            config_snapshot: Some(config.to_snapshot()),
        };
        match store.save_cache(&entry) {
            Ok(_) => info!("results saved to history store"),
            Err(e) => warn!("failed to save to history store: {e}"),
        }
    }

    /// Resolve the prompt template path; relative paths resolve against
    /// the repository setup directory.
    fn template_path(&self, config: &WorkflowConfig) -> Result<PathBuf, WorkflowError> {
        let spec = config.workflow_spec.as_ref().ok_or_else(|| {
            WorkflowError::Config(ConfigError::UnknownWorkflow {
                workflow: config.workflow_name().to_string(),
                repo: config.repo_name.clone(),
                available: String::new(),
            })
        })?;
        if spec.prompt.is_absolute() {
            Ok(spec.prompt.clone())
        } else {
            Ok(self.app.repos_dir().join(&spec.prompt))
        }
    }
}

/// First 200 characters of the response, as the stored summary.
fn summarize(response: &str) -> String {
    let truncated: String = response.chars().take(200).collect();
    if truncated.len() < response.len() {
        format!("{truncated}...")
    } else {
        truncated
    }
}

/// Tool access policy per workflow shape.
///
/// Review and analysis workflows get zero write-tool access so the LLM
/// can never mutate the repository it is reviewing; other workflows may
/// run git and write files.
fn tool_access_for(workflow_name: &str) -> ToolAccess {
    let lower = workflow_name.to_lowercase();
    if lower.contains("review") || lower.contains("analyze") || lower.contains("analysis") {
        ToolAccess::none()
    } else {
        ToolAccess::allow(["shell(git)", "write"])
    }
}
