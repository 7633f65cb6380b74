//! Prompt construction: language detection, template rendering, and
//! content hashing.
//!
//! Every template render goes through the same fixed variable contract
//! (see [`PromptContext`]). Two renderings are produced per run: the
//! **base** rendering empties the historical fields so it is a pure
//! function of (diff, repo, refs, languages, template) — that purity is
//! what makes the content-addressed cache key stable — while the **full**
//! rendering carries the historical context and commit tiers actually
//! sent to the LLM.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use minijinja::{Environment, UndefinedBehavior};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::git::CommitHistory;
use crate::store::ContextEntry;

/// Errors from prompt building.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("prompt template not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("failed to read template {path}: {source}")]
    ReadTemplate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("template rendering failed for {path}: {source}")]
    Render {
        path: PathBuf,
        source: minijinja::Error,
    },
}

/// Extraction of `diff --git a/<path>.<ext> b/` headers.
static DIFF_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"diff --git a/.*\.(\w+)\s+b/").unwrap());

/// Detect programming languages from diff headers.
///
/// Unrecognized or absent extensions yield `["unknown"]` so templates
/// always see a non-empty list.
pub fn detect_languages(diff_text: &str) -> Vec<String> {
    const LANG_MAP: &[(&str, &str)] = &[
        ("py", "python"),
        ("js", "javascript"),
        ("ts", "typescript"),
        ("java", "java"),
        ("go", "go"),
        ("rs", "rust"),
        ("c", "c"),
        ("cpp", "cpp"),
        ("html", "html"),
        ("css", "css"),
        ("sql", "sql"),
        ("md", "markdown"),
        ("sh", "bash"),
        ("yaml", "yaml"),
        ("json", "json"),
        ("rb", "ruby"),
        ("php", "php"),
        ("swift", "swift"),
        ("kt", "kotlin"),
    ];

    let extensions: HashSet<&str> = DIFF_HEADER_RE
        .captures_iter(diff_text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    let mut languages: Vec<String> = LANG_MAP
        .iter()
        .filter(|(ext, _)| extensions.contains(ext))
        .map(|(_, lang)| lang.to_string())
        .collect();
    languages.sort();

    if languages.is_empty() {
        vec!["unknown".to_string()]
    } else {
        languages
    }
}

/// The structured input to template rendering.
///
/// Field names are serialized in the uppercase form templates reference
/// (`{{ DIFF_CONTENT }}`, `{{ COMMIT_HISTORY.tier1 }}`, ...). This is the
/// rendering contract: a template referencing anything outside this set
/// fails under strict rendering.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    #[serde(rename = "DIFF_CONTENT")]
    pub diff: String,
    #[serde(rename = "REPO_NAME")]
    pub repo_name: String,
    #[serde(rename = "CODE_LANGS")]
    pub languages: Vec<String>,
    #[serde(rename = "CODE_LANG")]
    pub primary_language: String,
    #[serde(rename = "ANSWER_LANG")]
    pub answer_language: String,
    #[serde(rename = "COMMENT_LANG")]
    pub comment_language: String,
    #[serde(rename = "OUTPUT_FORMAT")]
    pub output_format: String,
    #[serde(rename = "OUTPUT_DIR")]
    pub output_dir: String,
    #[serde(rename = "CONTEXT")]
    pub context: Vec<ContextEntry>,
    #[serde(rename = "COMMIT_HISTORY")]
    pub commit_history: CommitHistory,
    #[serde(rename = "TARGET_REF")]
    pub target_ref: String,
    #[serde(rename = "SOURCE_REF")]
    pub source_ref: String,
}

impl PromptContext {
    /// The canonical, context-free variant used for cache-key hashing:
    /// identical to `self` except that historical context and commit
    /// history are emptied and the (timestamped, run-specific) output
    /// directory is blanked. Anything time-varying must stay out of the
    /// hashed rendering or the cache key loses its stability.
    pub fn base(&self) -> Self {
        Self {
            context: Vec::new(),
            commit_history: CommitHistory::default(),
            output_dir: String::new(),
            ..self.clone()
        }
    }
}

/// The two renderings produced for one run.
#[derive(Debug, Clone)]
pub struct RenderedPrompts {
    /// Sent to the LLM.
    pub full: String,
    /// Hashed for the cache key; never sent anywhere.
    pub base: String,
}

/// Render a template file against a context.
///
/// `strict` controls the undefined-variable policy: strict rendering
/// fails on any variable the context doesn't supply, surfacing
/// template/context contract drift immediately; lenient rendering
/// substitutes empty values.
pub fn render_template(
    template_path: &Path,
    ctx: &PromptContext,
    strict: bool,
) -> Result<String, RenderError> {
    if !template_path.exists() {
        return Err(RenderError::TemplateNotFound(template_path.to_path_buf()));
    }
    let source =
        std::fs::read_to_string(template_path).map_err(|e| RenderError::ReadTemplate {
            path: template_path.to_path_buf(),
            source: e,
        })?;

    let mut env = Environment::new();
    env.set_undefined_behavior(if strict {
        UndefinedBehavior::Strict
    } else {
        UndefinedBehavior::Lenient
    });

    let render = || -> Result<String, minijinja::Error> {
        let template = env.template_from_str(&source)?;
        template.render(minijinja::Value::from_serialize(ctx))
    };
    render().map_err(|e| RenderError::Render {
        path: template_path.to_path_buf(),
        source: e,
    })
}

/// Render the full and base prompts for a run from the same template.
pub fn build_prompt_with_context(
    template_path: &Path,
    ctx: &PromptContext,
    strict: bool,
) -> Result<RenderedPrompts, RenderError> {
    let base = render_template(template_path, &ctx.base(), strict)?;
    let full = render_template(template_path, ctx, strict)?;
    Ok(RenderedPrompts { full, base })
}

/// SHA-256 content hash over UTF-8 bytes, hex-encoded.
///
/// Used for both the diff hash and the base-prompt hash that together
/// with the model id form the cache key.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
