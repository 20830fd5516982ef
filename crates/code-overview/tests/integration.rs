use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use code_overview::config::{Config, FilesConfig};
use code_overview::db;
use code_overview::index::index_directory;
use code_overview::migrate::migrate_pool;
use code_overview::overview::generate_project_document;
use code_overview::sqlite_store::SqliteStore;
use code_overview_core::embedding::HashEmbedder;
use code_overview_core::filter::{build_filter, FilterOptions};
use code_overview_core::llm::LanguageModel;
use code_overview_core::overview::ContentType;
use code_overview_core::search::{format_search_results, search_overviews};
use code_overview_core::store::VectorStore;
use code_overview_core::summarize::{SummarizeOptions, SummaryKind};

// ============ Binary helpers ============

fn ovw_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ovw");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/overview.sqlite"

[embedding]
provider = "hash"
dims = 64

[retrieval]
default_limit = 3
"#,
        root.display()
    );

    let config_path = config_dir.join("overview.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ovw(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ovw_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ovw binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

// ============ Scripted model ============

const FOO_REPLY: &str = r#"{"overviews": [
    {"text": "Foo wraps the bar client and retries failed calls.", "type": "class",
     "name": "Foo", "namespace": "app.clients", "filePath": "f.ts",
     "summary": "Bar client wrapper", "references": ["bar.ts"]},
    {"text": "makeFoo builds a Foo with default retry settings.", "type": "function",
     "name": "makeFoo", "filePath": "f.ts", "summary": "Foo factory", "references": []}
]}"#;

const SHAPE_REPLY: &str = r#"[
    {"text": "Shape describes drawable geometry with an area.", "type": "interface",
     "name": "Shape", "filePath": "shape.ts", "summary": "Geometry contract", "references": []}
]"#;

/// Replies by prompt shape: extraction prompts by file marker, summary
/// prompts by their leading instruction.
#[derive(Default)]
struct Scripted {
    calls: AtomicUsize,
    foo_reply: Option<&'static str>,
}

impl Scripted {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            foo_reply: Some(FOO_REPLY),
        }
    }
}

#[async_trait]
impl LanguageModel for Scripted {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("File: f.ts\n") {
            return Ok(self.foo_reply.unwrap_or("not json").to_string());
        }
        if prompt.contains("File: shape.ts\n") {
            return Ok(SHAPE_REPLY.to_string());
        }
        if prompt.starts_with("Below is the complete list") {
            return Ok("# Project Overview\n\nmerged".to_string());
        }
        if prompt.starts_with("You are a senior architect") {
            assert!(prompt.contains("[{\"category\": \"Repository\"}]"));
            return Ok("# Developer Guide\n\nmerged".to_string());
        }
        if prompt.starts_with("Analyze the following code file") {
            return Ok("category entries".to_string());
        }
        if prompt.starts_with("Merge the following JSON arrays") {
            return Ok("[{\"category\": \"Repository\"}]".to_string());
        }
        if prompt.starts_with("Extract the key points") {
            return Ok("point".to_string());
        }
        if prompt.starts_with("Merge the key points") {
            return Ok(" file summary ".to_string());
        }
        anyhow::bail!("unexpected prompt: {}", prompt.lines().next().unwrap_or(""))
    }
}

fn write_sources(dir: &Path) {
    fs::write(dir.join("f.ts"), "export class Foo {}\nexport function makeFoo() {}\n").unwrap();
    fs::write(dir.join("shape.ts"), "export interface Shape { area(): number }\n").unwrap();
}

async fn sqlite_store(dir: &Path) -> Arc<dyn VectorStore> {
    let pool = db::connect_path(&dir.join("overview.sqlite")).await.unwrap();
    migrate_pool(&pool).await.unwrap();
    Arc::new(SqliteStore::new(pool, Arc::new(HashEmbedder::new(64))))
}

// ============ Library-level tests ============

#[tokio::test]
async fn test_index_then_filtered_search() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    write_sources(&src);
    let store = sqlite_store(tmp.path()).await;
    let model = Scripted::new();

    let report = index_directory(&model, store.clone(), &FilesConfig::default(), &src, "demo")
        .await
        .unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.overviews, 3);
    assert_eq!(report.persisted, 3);
    assert!(report.rejected.is_empty());
    assert_eq!(store.count("demo").await.unwrap(), 3);

    let filter = build_filter(&FilterOptions {
        content_type: Some(ContentType::Class),
        project_name: Some("demo".to_string()),
        ..Default::default()
    });
    let hits = search_overviews(store.as_ref(), "demo", "bar client", 5, filter.as_ref())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "f.ts-class-Foo");
    assert_eq!(hits[0].metadata["references"], "bar.ts");
    assert_eq!(hits[0].metadata["namespace"], "app.clients");

    let filter = build_filter(&FilterOptions {
        references: vec!["bar.ts".to_string(), "missing.ts".to_string()],
        ..Default::default()
    });
    let hits = search_overviews(store.as_ref(), "demo", "anything", 5, filter.as_ref())
        .await
        .unwrap();
    assert_eq!(format_search_results(&hits), "Foo wraps the bar client and retries failed calls.");
}

#[tokio::test]
async fn test_reindex_overwrites_instead_of_duplicating() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    write_sources(&src);
    let store = sqlite_store(tmp.path()).await;
    let model = Scripted::new();

    for _ in 0..2 {
        index_directory(&model, store.clone(), &FilesConfig::default(), &src, "demo")
            .await
            .unwrap();
    }
    assert_eq!(store.count("demo").await.unwrap(), 3);
}

#[tokio::test]
async fn test_invalid_reply_skips_only_that_file() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    write_sources(&src);
    let store = sqlite_store(tmp.path()).await;
    let model = Scripted {
        foo_reply: None,
        ..Default::default()
    };

    let report = index_directory(&model, store.clone(), &FilesConfig::default(), &src, "demo")
        .await
        .unwrap();
    assert_eq!(report.rejected, vec!["f.ts".to_string()]);
    assert_eq!(report.persisted, 1);

    let hits = store.similarity_search("demo", "shape", 5, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "shape.ts-interface-Shape");
}

#[tokio::test]
async fn test_clear_empties_project() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    write_sources(&src);
    let store = sqlite_store(tmp.path()).await;

    index_directory(&Scripted::new(), store.clone(), &FilesConfig::default(), &src, "demo")
        .await
        .unwrap();

    let filter = build_filter(&FilterOptions {
        content_type: Some(ContentType::Class),
        references: vec!["bar.ts".to_string()],
        ..Default::default()
    });
    let hits = search_overviews(store.as_ref(), "demo", "Foo", 5, filter.as_ref())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);

    store.delete_collection("demo").await.unwrap();

    let hits = search_overviews(store.as_ref(), "demo", "Foo", 5, filter.as_ref())
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_project_document_is_written() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    write_sources(&src);
    let output = tmp.path().join("docs/overview.md");
    fs::create_dir_all(output.parent().unwrap()).unwrap();
    fs::write(&output, "# Old overview").unwrap();
    let model = Scripted::new();

    let document = generate_project_document(
        &model,
        &FilesConfig::default(),
        &src,
        &output,
        SummaryKind::Overview,
        &SummarizeOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(document, "# Project Overview\n\nmerged");
    assert_eq!(fs::read_to_string(&output).unwrap(), document);
    // Two short files: one map and one reduce call each, plus the merge.
    assert_eq!(model.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_guidelines_document_is_written() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    write_sources(&src);
    let output = tmp.path().join("guidelines.md");
    let model = Scripted::new();

    let document = generate_project_document(
        &model,
        &FilesConfig::default(),
        &src,
        &output,
        SummaryKind::Guidelines,
        &SummarizeOptions::for_kind(SummaryKind::Guidelines),
    )
    .await
    .unwrap();

    assert_eq!(document, "# Developer Guide\n\nmerged");
    assert_eq!(fs::read_to_string(&output).unwrap(), document);
    assert_eq!(model.calls.load(Ordering::SeqCst), 5);
}

// ============ Binary tests ============

#[test]
fn test_init_is_idempotent() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ovw(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data/overview.sqlite").exists());

    let (_, stderr, success) = run_ovw(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_search_empty_project() {
    let (_tmp, config_path) = setup_test_env();
    run_ovw(&config_path, &["init"]);

    let (stdout, stderr, success) = run_ovw(
        &config_path,
        &["search", "config parser", "--project", "demo", "--type", "class"],
    );
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_rejects_unknown_type() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_ovw(
        &config_path,
        &["search", "q", "--project", "demo", "--type", "module"],
    );
    assert!(!success);
}

#[test]
fn test_clear_reports_count() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_ovw(&config_path, &["clear", "--project", "demo"]);
    assert!(success, "clear failed: {}", stderr);
    assert!(stdout.contains("Cleared 0 overview(s) from 'demo'"));
}

#[test]
fn test_index_without_language_model_fails() {
    let (tmp, config_path) = setup_test_env();
    let src = tmp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    write_sources(&src);

    let (_, stderr, success) = run_ovw(
        &config_path,
        &["index", src.to_str().unwrap(), "--project", "demo"],
    );
    assert!(!success);
    assert!(stderr.contains("disabled"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_openai_without_key_is_configuration_error() {
    let (tmp, _) = setup_test_env();
    let config_path = tmp.path().join("config/openai.toml");
    fs::write(
        &config_path,
        format!(
            "[db]\npath = \"{}/data/overview.sqlite\"\n[llm]\nprovider = \"openai\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();
    let file = tmp.path().join("a.md");
    fs::write(&file, "# A").unwrap();

    let (_, stderr, success) = run_ovw(&config_path, &["summarize", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("OPENAI_API_KEY"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_ovw(&tmp.path().join("nope.toml"), &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_minimal_config_is_valid() {
    code_overview::config::validate(&Config::minimal()).unwrap();
}
