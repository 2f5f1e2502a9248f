//! Page rotation
//!
//! Adds a normalized angle to every page's effective `/Rotate` value.

use crate::document::{self, normalize_degrees};
use crate::error::PdfKitError;
use lopdf::Object;

/// `/Rotate` only holds multiples of 90.
pub fn check_quarter_turn(degrees: i32) -> Result<(), PdfKitError> {
    if degrees % 90 != 0 {
        return Err(PdfKitError::UnsupportedOperation(format!(
            "Rotation must be a multiple of 90 degrees, got {}",
            degrees
        )));
    }
    Ok(())
}

/// Rotate every page by `degrees`, a multiple of 90 normalized modulo 360.
pub fn rotate_document(bytes: &[u8], degrees: i32) -> Result<Vec<u8>, PdfKitError> {
    check_quarter_turn(degrees)?;
    let mut doc = document::load(bytes)?;
    let amount = normalize_degrees(degrees);

    for page_id in document::page_ids(&doc)? {
        let rotation = normalize_degrees(document::page_rotation(&doc, page_id) + amount);
        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| PdfKitError::MalformedDocument(format!("Invalid page object: {}", e)))?;
        page.set("Rotate", Object::Integer(rotation as i64));
    }

    document::save(&mut doc)
}

/// Effective rotation of each page, in page order.
pub fn page_rotations(bytes: &[u8]) -> Result<Vec<i32>, PdfKitError> {
    let doc = document::load(bytes)?;
    Ok(doc
        .get_pages()
        .into_values()
        .map(|id| document::page_rotation(&doc, id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pdf::{create_test_pdf, page_texts};
    use proptest::prelude::*;

    #[test]
    fn test_rotate_every_page() {
        let pdf = create_test_pdf(3, "R");
        let rotated = rotate_document(&pdf, 90).unwrap();
        assert_eq!(page_rotations(&rotated).unwrap(), vec![90, 90, 90]);
    }

    #[test]
    fn test_negative_angle_is_normalized() {
        let pdf = create_test_pdf(1, "R");
        let rotated = rotate_document(&pdf, -90).unwrap();
        assert_eq!(page_rotations(&rotated).unwrap(), vec![270]);
    }

    #[test]
    fn test_rotation_adds_to_existing() {
        let pdf = create_test_pdf(2, "R");
        let once = rotate_document(&pdf, 180).unwrap();
        let twice = rotate_document(&once, 270).unwrap();
        assert_eq!(page_rotations(&twice).unwrap(), vec![90, 90]);
    }

    #[test]
    fn test_rotation_keeps_content() {
        let pdf = create_test_pdf(2, "Keep");
        let rotated = rotate_document(&pdf, 90).unwrap();
        let texts = page_texts(&rotated);
        assert!(texts[0].contains("Keep-Page-1"));
        assert!(texts[1].contains("Keep-Page-2"));
    }

    #[test]
    fn test_rotate_rejects_partial_turns() {
        let pdf = create_test_pdf(1, "R");
        for degrees in [45, -30, 1, 359] {
            assert!(matches!(
                rotate_document(&pdf, degrees),
                Err(PdfKitError::UnsupportedOperation(_))
            ));
        }
        assert!(rotate_document(&pdf, -450).is_ok());
    }

    #[test]
    fn test_rotate_rejects_garbage() {
        assert!(matches!(
            rotate_document(b"nope", 90),
            Err(PdfKitError::MalformedDocument(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn rotations_compose(a in -12i32..12, b in -12i32..12) {
            let (a, b) = (a * 90, b * 90);
            let pdf = create_test_pdf(1, "P");
            let stepwise = rotate_document(&rotate_document(&pdf, a).unwrap(), b).unwrap();
            let combined = rotate_document(&pdf, a + b).unwrap();
            prop_assert_eq!(page_rotations(&stepwise).unwrap(), page_rotations(&combined).unwrap());
        }
    }
}
