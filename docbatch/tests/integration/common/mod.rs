//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use docbatch::config::{PartialConfig, PartialInput, PartialOutput};
use lopdf::{Document, Object, dictionary};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary project directory with `in/` and `out/` roots.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn input(&self) -> PathBuf {
        self.root().join("in")
    }

    pub fn output(&self) -> PathBuf {
        self.root().join("out")
    }

    /// Write `content` to `relative` under the input root.
    pub fn source(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.input().join(relative);
        write_bytes(&path, content.as_bytes());
        path
    }

    /// Write a blank PDF with `pages` pages to `relative` under the input root.
    pub fn pdf(&self, relative: &str, pages: usize) -> PathBuf {
        let path = self.input().join(relative);
        write_bytes(&path, &pdf_bytes(pages));
        path
    }

    /// Command-line style layer pointing both roots into the workspace.
    pub fn roots(&self) -> PartialConfig {
        PartialConfig {
            input: Some(PartialInput {
                path: Some(self.input()),
                ..Default::default()
            }),
            output: Some(PartialOutput {
                path: Some(self.output()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

pub fn write_bytes(path: &Path, bytes: &[u8]) {
    std::fs::create_dir_all(path.parent().expect("path has a parent")).unwrap();
    std::fs::write(path, bytes).unwrap();
}

/// A minimal PDF with `pages` blank A4 pages.
pub fn pdf_bytes(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Number of pages in the PDF at `path`.
pub fn page_count(path: &Path) -> usize {
    let bytes = std::fs::read(path).unwrap();
    Document::load_mem(&bytes).unwrap().get_pages().len()
}
