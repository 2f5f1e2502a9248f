//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document, pages in input order.

use crate::document;
use crate::error::PdfKitError;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. If single document, check it parses and has pages, then return it as-is
/// 3. Load every input and copy inherited page attributes onto the pages
/// 4. Use the first document as the destination
/// 5. For each remaining document:
///    a. Offset its object ids past the destination's highest id
///    b. Import all objects with remapped references
///    c. Append its pages to the destination page list
/// 6. Rebuild a flat page tree, drop orphaned objects, compress
pub fn merge_documents<B: AsRef<[u8]>>(documents: &[B]) -> Result<Vec<u8>, PdfKitError> {
    let (first, rest) = documents
        .split_first()
        .ok_or_else(|| PdfKitError::UnsupportedOperation("No documents to merge".into()))?;

    if rest.is_empty() {
        let doc = document::load(first.as_ref())?;
        document::page_ids(&doc)?;
        return Ok(first.as_ref().to_vec());
    }

    let mut loaded = Vec::with_capacity(documents.len());
    for (i, bytes) in documents.iter().enumerate() {
        let mut doc = Document::load_mem(bytes.as_ref()).map_err(|e| {
            PdfKitError::MalformedDocument(format!("Failed to load document {}: {}", i + 1, e))
        })?;
        document::materialize_inherited(&mut doc);
        loaded.push(doc);
    }

    let mut sources = loaded.into_iter();
    let Some(mut dest) = sources.next() else {
        return Err(PdfKitError::UnsupportedOperation("No documents to merge".into()));
    };
    let mut dest_max_id = dest.max_id;
    let mut page_refs: Vec<ObjectId> = dest.get_pages().into_values().collect();

    for source in sources {
        let id_offset = dest_max_id;
        let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();

        for (old_id, object) in source.objects {
            let new_id = (old_id.0 + id_offset, old_id.1);
            dest.objects.insert(new_id, remap_object_refs(object, id_offset));
        }

        page_refs.extend(source_pages.into_iter().map(|id| (id.0 + id_offset, id.1)));
        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    dest.max_id = dest_max_id;
    update_page_tree(&mut dest, &page_refs)?;

    let pruned = dest.prune_objects();
    debug!(
        pages = page_refs.len(),
        pruned = pruned.len(),
        "merged page trees"
    );

    dest.compress();
    document::save(&mut dest)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the destination's root Pages node at `page_refs` and reparent
/// every page onto it.
fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<(), PdfKitError> {
    let pages_id = root_pages_id(doc)?;

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages_dict)) => {
            let kids = page_refs.iter().map(|&id| Object::Reference(id)).collect();
            pages_dict.set("Kids", Object::Array(kids));
            pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
        }
        _ => {
            return Err(PdfKitError::OperationError(
                "Invalid pages dictionary".into(),
            ))
        }
    }

    for page_id in page_refs {
        if let Some(Object::Dictionary(page)) = doc.objects.get_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(())
}

fn root_pages_id(doc: &Document) -> Result<ObjectId, PdfKitError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfKitError::OperationError("No Root in trailer".into()))?;

    doc.get_object(catalog_id)
        .and_then(Object::as_dict)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| PdfKitError::OperationError("No Pages in catalog".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pdf::{build_document, create_test_pdf, page_texts};

    #[test]
    fn test_merge_empty_fails() {
        let result = merge_documents::<Vec<u8>>(&[]);
        assert!(matches!(result, Err(PdfKitError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_merge_single_document_returns_same() {
        let pdf = create_test_pdf(3, "Only");
        let merged = merge_documents(&[pdf.clone()]).unwrap();
        assert_eq!(merged, pdf);
    }

    #[test]
    fn test_merge_single_garbage_input_fails() {
        let result = merge_documents(&[b"garbage".to_vec()]);
        assert!(matches!(result, Err(PdfKitError::MalformedDocument(_))));

        let empty = merge_documents(&[create_test_pdf(0, "None")]);
        assert!(matches!(empty, Err(PdfKitError::MalformedDocument(_))));
    }

    #[test]
    fn test_merge_two_documents_combines_pages() {
        let a = create_test_pdf(2, "A");
        let b = create_test_pdf(3, "B");
        let merged = merge_documents(&[a, b]).unwrap();
        assert_eq!(crate::info::page_count(&merged).unwrap(), 5);
    }

    #[test]
    fn test_merge_preserves_input_order() {
        let merged = merge_documents(&[
            create_test_pdf(2, "File1"),
            create_test_pdf(1, "File2"),
            create_test_pdf(2, "File3"),
        ])
        .unwrap();

        let texts = page_texts(&merged);
        let expected = [
            "File1-Page-1",
            "File1-Page-2",
            "File2-Page-1",
            "File3-Page-1",
            "File3-Page-2",
        ];
        assert_eq!(texts.len(), expected.len());
        for (text, marker) in texts.iter().zip(expected) {
            assert!(text.contains(marker), "expected {} in {}", marker, text);
        }
    }

    #[test]
    fn test_merge_keeps_page_sizes() {
        let mut small = build_document(1, "Small", (300, 400));
        let mut bytes = Vec::new();
        small.save_to(&mut bytes).unwrap();

        let merged = merge_documents(&[create_test_pdf(1, "Letter"), bytes]).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        let sizes: Vec<_> = doc
            .get_pages()
            .into_values()
            .map(|id| document::page_size(&doc, id))
            .collect();
        assert_eq!(sizes, vec![(612.0, 792.0), (300.0, 400.0)]);
    }

    #[test]
    fn test_merged_pages_share_one_parent() {
        let merged =
            merge_documents(&[create_test_pdf(1, "A"), create_test_pdf(1, "B")]).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        let pages_id = root_pages_id(&doc).unwrap();

        for page_id in doc.get_pages().into_values() {
            let parent = doc
                .get_object(page_id)
                .and_then(Object::as_dict)
                .and_then(|d| d.get(b"Parent"))
                .and_then(Object::as_reference)
                .unwrap();
            assert_eq!(parent, pages_id);
        }
    }

    #[test]
    fn test_merge_rejects_corrupt_input() {
        let result = merge_documents(&[create_test_pdf(1, "A"), b"garbage".to_vec()]);
        match result {
            Err(PdfKitError::MalformedDocument(msg)) => assert!(msg.contains("document 2")),
            other => panic!("expected MalformedDocument, got {:?}", other.map(|b| b.len())),
        }
    }
}
