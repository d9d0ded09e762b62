//! Page-tree concatenation with lopdf.

use lopdf::{Document, Object, ObjectId};

use crate::error::{DocBatchError, Result};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Upper bound on page-tree depth when resolving inherited attributes.
const MAX_TREE_DEPTH: usize = 64;

/// Concatenates documents into one.
#[derive(Debug, Clone, Default)]
pub struct PdfMerger;

impl PdfMerger {
    /// Create a merger.
    pub fn new() -> Self {
        Self
    }

    /// Append the pages of every document to the first one, in order.
    ///
    /// Object ids of each appended document are shifted past the ids already
    /// in use, its pages are attached to the first document's page tree, and
    /// attributes they used to inherit are copied onto them.
    ///
    /// # Errors
    ///
    /// [`DocBatchError::MergeFailed`] when `documents` is empty or the first
    /// document has no usable page tree.
    pub fn merge(&self, documents: Vec<Document>) -> Result<Document> {
        let mut documents = documents.into_iter();
        let Some(mut merged) = documents.next() else {
            return Err(DocBatchError::merge_failed("no documents to merge"));
        };

        let pages_id = page_tree_root(&merged)?;
        let mut max_id = merged.max_id;

        for mut doc in documents {
            doc.renumber_objects_with(max_id + 1);
            max_id = doc.max_id;

            let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
            copy_inherited_attributes(&mut doc, &page_ids);

            merged.objects.extend(doc.objects);
            append_pages(&mut merged, pages_id, &page_ids)?;
        }

        merged.max_id = max_id;
        merged.prune_objects();
        merged.renumber_objects();
        Ok(merged)
    }
}

fn page_tree_root(doc: &Document) -> Result<ObjectId> {
    doc.catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| DocBatchError::merge_failed(format!("missing page tree: {e}")))
}

fn inherited_value(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut parent = doc
        .get_dictionary(page_id)
        .ok()?
        .get(b"Parent")
        .and_then(Object::as_reference)
        .ok();

    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn missing_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };

    INHERITABLE
        .into_iter()
        .filter(|key| !page.has(key))
        .filter_map(|key| inherited_value(doc, page_id, key).map(|value| (key, value)))
        .collect()
}

fn copy_inherited_attributes(doc: &mut Document, page_ids: &[ObjectId]) {
    for &page_id in page_ids {
        let missing = missing_attributes(doc, page_id);
        if missing.is_empty() {
            continue;
        }

        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            for (key, value) in missing {
                page.set(key.to_vec(), value);
            }
        }
    }
}

fn append_pages(merged: &mut Document, pages_id: ObjectId, page_ids: &[ObjectId]) -> Result<()> {
    for &page_id in page_ids {
        if let Ok(page) = merged.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    let pages = merged
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| DocBatchError::merge_failed(format!("page tree root is not a dictionary: {e}")))?;

    let kids = pages
        .get_mut(b"Kids")
        .and_then(Object::as_array_mut)
        .map_err(|_| DocBatchError::merge_failed("page tree root has no Kids array"))?;
    kids.extend(page_ids.iter().map(|&id| Object::Reference(id)));

    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    pages.set("Count", Object::Integer(count + page_ids.len() as i64));

    Ok(())
}
