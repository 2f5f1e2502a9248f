//! Shared lopdf plumbing
//!
//! Loading, saving and page attribute lookup used by every transform.

use crate::error::PdfKitError;
use lopdf::{Document, Object, ObjectId};

/// US Letter, used when a page carries no readable MediaBox.
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Attributes a page may inherit from its ancestors in the page tree.
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Page trees deeper than this are treated as cyclic.
const MAX_TREE_DEPTH: usize = 64;

pub(crate) fn load(bytes: &[u8]) -> Result<Document, PdfKitError> {
    Document::load_mem(bytes).map_err(|e| PdfKitError::MalformedDocument(e.to_string()))
}

pub(crate) fn save(doc: &mut Document) -> Result<Vec<u8>, PdfKitError> {
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| PdfKitError::OperationError(format!("Failed to save PDF: {}", e)))?;
    Ok(output)
}

/// Page ids in reading order. Errors when the document has no pages.
pub(crate) fn page_ids(doc: &Document) -> Result<Vec<ObjectId>, PdfKitError> {
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(PdfKitError::MalformedDocument("PDF has no pages".into()));
    }
    Ok(pages)
}

/// Follow one level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Look up `key` on the page, then on each ancestor via `Parent`.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_object(current).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

pub(crate) fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Effective MediaBox as `[llx, lly, urx, ury]`.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(Object::Array(values)) = inherited_attribute(doc, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };
    if values.len() != 4 {
        return DEFAULT_MEDIA_BOX;
    }

    let mut rect = [0.0f32; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        match as_number(resolve(doc, value)) {
            Some(n) => *slot = n,
            None => return DEFAULT_MEDIA_BOX,
        }
    }
    rect
}

/// Width and height in points.
pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let [llx, lly, urx, ury] = media_box(doc, page_id);
    ((urx - llx).abs(), (ury - lly).abs())
}

/// Effective page rotation in degrees, normalized to 0..360.
pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> i32 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .map(|deg| normalize_degrees((deg % 360) as i32))
        .unwrap_or(0)
}

/// Map any angle onto 0..360, so -90 becomes 270 and 450 becomes 90.
pub fn normalize_degrees(degrees: i32) -> i32 {
    ((degrees % 360) + 360) % 360
}

/// Copy inherited attributes onto each page so pages survive being moved
/// into another page tree.
pub(crate) fn materialize_inherited(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for page_id in page_ids {
        let Ok(page) = doc.get_object(page_id).and_then(Object::as_dict) else {
            continue;
        };

        let mut missing = Vec::new();
        for key in INHERITABLE_KEYS {
            if page.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(doc, page_id, key) {
                missing.push((key, value.clone()));
            }
        }

        if missing.is_empty() {
            continue;
        }
        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            for (key, value) in missing {
                page.set(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    /// Two pages under a nested Pages node that carries MediaBox and Rotate.
    fn nested_tree_doc() -> Document {
        let mut doc = Document::with_version("1.7");
        let root_pages_id = doc.new_object_id();
        let inner_pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..2 {
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"".to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => inner_pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            inner_pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Parent" => root_pages_id,
                "Kids" => kids,
                "Count" => 2,
                "Rotate" => 90,
            }),
        );
        doc.objects.insert(
            root_pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![inner_pages_id.into()],
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => root_pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(0), 0);
        assert_eq!(normalize_degrees(-90), 270);
        assert_eq!(normalize_degrees(450), 90);
        assert_eq!(normalize_degrees(-720), 0);
    }

    #[test]
    fn test_inherits_through_nested_parents() {
        let doc = nested_tree_doc();
        let first = doc.get_pages()[&1];
        assert_eq!(page_size(&doc, first), (595.0, 842.0));
        assert_eq!(page_rotation(&doc, first), 90);
    }

    #[test]
    fn test_missing_media_box_falls_back_to_letter() {
        let mut doc = nested_tree_doc();
        for object in doc.objects.values_mut() {
            if let Object::Dictionary(dict) = object {
                dict.remove(b"MediaBox");
            }
        }

        let first = doc.get_pages()[&1];
        assert_eq!(page_size(&doc, first), (612.0, 792.0));
    }

    #[test]
    fn test_materialize_copies_attributes_onto_pages() {
        let mut doc = nested_tree_doc();
        materialize_inherited(&mut doc);

        for page_id in doc.get_pages().into_values() {
            let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
            assert_eq!(page.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
            assert!(page.has(b"MediaBox"));
        }
    }

    #[test]
    fn test_load_rejects_garbage() {
        let result = load(b"not a pdf at all");
        assert!(matches!(result, Err(PdfKitError::MalformedDocument(_))));
    }
}
