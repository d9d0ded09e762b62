//! Merging a nested tree of PDFs, one output per directory.

use docbatch::config::{Config, SortDirection, SortMethod};
use docbatch::context::{RunContext, RunEvent};
use docbatch::merge::MergeCoordinator;
use std::sync::Arc;

use crate::common::{Workspace, page_count, write_bytes};

fn config(ws: &Workspace) -> Config {
    let mut config = Config::default();
    config.input.path = ws.input();
    config.output.path = ws.output();
    config
}

#[tokio::test]
async fn test_nested_tree_one_pdf_per_directory() {
    let ws = Workspace::new();
    ws.pdf("cover.pdf", 1);
    ws.pdf("vol1/ch1.pdf", 2);
    ws.pdf("vol1/ch2.pdf", 3);
    ws.pdf("vol1/appendix/a.pdf", 1);
    ws.pdf("vol2/intro.pdf", 4);
    std::fs::create_dir_all(ws.input().join("empty")).unwrap();

    let (context, mut events) = RunContext::with_events();
    let coordinator = MergeCoordinator::new(Arc::new(config(&ws)), context).unwrap();
    let summary = coordinator.merge_all(&ws.input(), &ws.output()).await.unwrap();

    assert_eq!(summary.total, 3);
    assert!(summary.all_succeeded());
    assert_eq!(page_count(&ws.output().join("vol1.pdf")), 5);
    assert_eq!(page_count(&ws.output().join("appendix.pdf")), 1);
    assert_eq!(page_count(&ws.output().join("vol2.pdf")), 4);
    assert!(!ws.output().join("in.pdf").exists());
    assert!(!ws.output().join("empty.pdf").exists());

    let mut merged = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RunEvent::DirectoryMerged { dir, files, .. } = event {
            merged.push((dir.file_name().unwrap().to_string_lossy().into_owned(), files));
        }
    }
    assert_eq!(
        merged,
        vec![
            ("vol1".to_string(), 2),
            ("appendix".to_string(), 1),
            ("vol2".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn test_second_run_skips_existing_outputs() {
    let ws = Workspace::new();
    ws.pdf("book/a.pdf", 1);
    ws.pdf("book/b.pdf", 1);

    let coordinator = MergeCoordinator::new(Arc::new(config(&ws)), RunContext::new()).unwrap();
    coordinator.merge_all(&ws.input(), &ws.output()).await.unwrap();

    ws.pdf("book/c.pdf", 1);
    let second = coordinator.merge_all(&ws.input(), &ws.output()).await.unwrap();

    assert_eq!(second.success, 1);
    assert_eq!(second.skipped, 1);
    assert_eq!(page_count(&ws.output().join("book.pdf")), 2);
}

#[tokio::test]
async fn test_corrupt_input_fails_only_its_directory() {
    let ws = Workspace::new();
    ws.pdf("good/a.pdf", 2);
    ws.pdf("bad/a.pdf", 1);
    write_bytes(&ws.input().join("bad/b.pdf"), b"this is not a pdf");

    let coordinator = MergeCoordinator::new(Arc::new(config(&ws)), RunContext::new()).unwrap();
    let summary = coordinator.merge_all(&ws.input(), &ws.output()).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.failed_operations[0].path.ends_with("bad"));
    assert!(!ws.output().join("bad.pdf").exists());
    assert_eq!(page_count(&ws.output().join("good.pdf")), 2);
}

#[tokio::test]
async fn test_size_sort_and_uncompressed_output() {
    let ws = Workspace::new();
    ws.pdf("deck/large.pdf", 5);
    ws.pdf("deck/small.pdf", 1);
    ws.pdf("deck/medium.pdf", 3);

    let mut config = config(&ws);
    config.options.sort.enabled = true;
    config.options.sort.method = SortMethod::Size;
    config.options.sort.direction = SortDirection::Desc;
    config.options.compression.enabled = false;

    let coordinator = MergeCoordinator::new(Arc::new(config), RunContext::new()).unwrap();
    let files = vec![
        ws.input().join("deck/small.pdf"),
        ws.input().join("deck/large.pdf"),
        ws.input().join("deck/medium.pdf"),
    ];
    let stats = coordinator
        .merge_directory(&files, &ws.output().join("deck.pdf"))
        .await
        .unwrap();

    let order: Vec<_> = stats
        .merged_files
        .iter()
        .map(|p| p.file_stem().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(order, ["large", "medium", "small"]);
    assert_eq!(stats.total_pages, 9);
    assert!(!stats.write.compressed);
    assert_eq!(page_count(&ws.output().join("deck.pdf")), 9);
}
