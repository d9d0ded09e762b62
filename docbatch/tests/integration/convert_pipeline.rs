//! End-to-end conversion runs with an in-process renderer.

use async_trait::async_trait;
use docbatch::config::Config;
use docbatch::context::{RunContext, RunEvent, SkipReason};
use docbatch::convert::{ConversionKind, ConvertService, RenderRequest, Renderer};
use docbatch::error::{DocBatchError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::common::Workspace;

/// Writes a stub PDF for every request and remembers what it rendered.
/// With `flaky`, the first attempt for each source fails.
#[derive(Default)]
struct RecordingRenderer {
    flaky: bool,
    rendered: Mutex<Vec<PathBuf>>,
}

impl RecordingRenderer {
    fn flaky() -> Self {
        Self {
            flaky: true,
            ..Default::default()
        }
    }

    fn rendered(&self) -> Vec<PathBuf> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<()> {
        let first_attempt = {
            let mut rendered = self.rendered.lock().unwrap();
            let first = !rendered.contains(&request.source);
            rendered.push(request.source.clone());
            first
        };

        if self.flaky && first_attempt {
            return Err(DocBatchError::render(&request.source, "renderer warming up"));
        }
        let body = tokio::fs::read_to_string(&request.source).await?;
        if body.contains("BROKEN") {
            return Err(DocBatchError::render(&request.source, "unbalanced code fence"));
        }

        tokio::fs::write(&request.output, b"%PDF-1.5 stub").await?;
        Ok(())
    }
}

fn config(ws: &Workspace) -> Config {
    let mut config = Config::default();
    config.input.path = ws.input();
    config.output.path = ws.output();
    config
}

fn drain(events: &mut tokio::sync::mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

#[tokio::test]
async fn test_rerun_skips_everything() {
    let ws = Workspace::new();
    ws.source("index.md", "# Home");
    ws.source("guide/install.md", "# Install");
    ws.source("guide/usage.markdown", "# Usage");
    ws.source("notes.txt", "not a document");

    let renderer = Arc::new(RecordingRenderer::default());
    let (context, mut events) = RunContext::with_events();
    let service = ConvertService::new(config(&ws), context, renderer.clone());

    // `.markdown` is not in the default extension list.
    let first = service.convert_all(ConversionKind::Markdown).await.unwrap();
    assert_eq!(first.total, 2);
    assert_eq!(first.success_rate, 100.0);
    assert!(ws.output().join("index.pdf").is_file());
    assert!(ws.output().join("guide/install.pdf").is_file());

    let started = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, RunEvent::TaskStarted { .. }))
        .count();
    assert_eq!(started, 2);

    let second = service.convert_all(ConversionKind::Markdown).await.unwrap();
    assert_eq!(second.total, 0);
    assert_eq!(renderer.rendered().len(), 2);

    let skipped: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            RunEvent::TaskSkipped { reason, .. } => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![SkipReason::OutputExists; 2]);
}

#[tokio::test]
async fn test_partial_failure_is_reported_not_raised() {
    let ws = Workspace::new();
    ws.source("a.md", "# A");
    ws.source("b.md", "```rust\nBROKEN");
    ws.source("c.md", "# C");

    let service = ConvertService::new(
        config(&ws),
        RunContext::new(),
        Arc::new(RecordingRenderer::default()),
    );
    let summary = service.convert_all(ConversionKind::Markdown).await.unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.success, 2);
    assert!((summary.success_rate - 66.7).abs() < 0.1);
    assert_eq!(summary.failed_operations.len(), 1);
    assert!(summary.failed_operations[0].path.ends_with("b.md"));
    assert!(summary.failed_operations[0].error.contains("unbalanced code fence"));
}

#[tokio::test]
async fn test_incremental_reconverts_only_stale_sources() {
    let ws = Workspace::new();
    ws.source("fresh.md", "# Fresh");
    let stale = ws.source("stale.md", "# Stale");

    let mut config = config(&ws);
    config.features.incremental = true;
    let renderer = Arc::new(RecordingRenderer::default());
    let service = ConvertService::new(config, RunContext::new(), renderer.clone());

    service.convert_all(ConversionKind::Markdown).await.unwrap();

    File::options()
        .write(true)
        .open(&stale)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(120))
        .unwrap();

    let second = service.convert_all(ConversionKind::Markdown).await.unwrap();
    assert_eq!(second.total, 1);
    assert_eq!(second.success, 1);

    let rendered = renderer.rendered();
    assert_eq!(rendered.len(), 3);
    assert_eq!(rendered.last(), Some(&stale));
}

#[tokio::test]
async fn test_retry_recovers_flaky_renders() {
    let ws = Workspace::new();
    ws.source("a.md", "# A");
    ws.source("b.md", "# B");

    let mut config = config(&ws);
    config.features.retry = 1;
    let renderer = Arc::new(RecordingRenderer::flaky());
    let service = ConvertService::new(config, RunContext::new(), renderer.clone());

    let summary = service.convert_all(ConversionKind::Markdown).await.unwrap();
    assert_eq!(summary.success, 2);
    assert_eq!(renderer.rendered().len(), 4);
}

#[tokio::test]
async fn test_without_retry_flaky_renders_fail() {
    let ws = Workspace::new();
    ws.source("a.md", "# A");

    let renderer = Arc::new(RecordingRenderer::flaky());
    let service = ConvertService::new(config(&ws), RunContext::new(), renderer.clone());

    let summary = service.convert_all(ConversionKind::Markdown).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert!(summary.failed_operations[0].error.contains("warming up"));
}

#[tokio::test]
async fn test_rename_pattern_flat_layout_and_filters() {
    let ws = Workspace::new();
    ws.source("chapters/one.md", "# One");
    ws.source("chapters/two.md", "# Two");
    ws.source("drafts/three.md", "# Three");

    let mut config = config(&ws);
    config.output.rename_pattern = Some("book-{name}".to_string());
    config.output.maintain_dir_structure = false;
    config.input.filters.exclude = vec!["drafts".to_string()];

    let service = ConvertService::new(
        config,
        RunContext::new(),
        Arc::new(RecordingRenderer::default()),
    );
    let summary = service.convert_all(ConversionKind::Markdown).await.unwrap();
    assert_eq!(summary.total, 2);

    let produced: HashSet<String> = std::fs::read_dir(ws.output())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        produced,
        HashSet::from(["book-one.pdf".to_string(), "book-two.pdf".to_string()])
    );
}

#[tokio::test]
async fn test_missing_input_root_fails_the_run() {
    let ws = Workspace::new();
    let service = ConvertService::new(
        config(&ws),
        RunContext::new(),
        Arc::new(RecordingRenderer::default()),
    );

    let err = service.convert_all(ConversionKind::Markdown).await.unwrap_err();
    assert!(matches!(err, DocBatchError::Scan { .. }));
    assert_eq!(err.exit_code(), 2);
}
