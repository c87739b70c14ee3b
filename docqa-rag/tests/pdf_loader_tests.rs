//! PDF ingestion through `FileLoader`. Requires the `pdf` feature.
#![cfg(feature = "pdf")]

use docqa_rag::{DocumentLoader, FileLoader, RagError};

/// Build a PDF with one Helvetica text line per page.
fn make_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::dictionary;
    use lopdf::{Document, Object, ObjectId, Stream};

    let mut doc = Document::with_version("1.4");
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let pages_id = doc.new_object_id();

    let page_ids: Vec<ObjectId> = pages
        .iter()
        .map(|text| {
            let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            })
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

#[tokio::test]
async fn pdf_yields_one_segment_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manual.pdf");
    std::fs::write(&path, make_pdf(&["Warranty terms", "Cleaning instructions"])).unwrap();

    let raw = FileLoader::new().load(&path).await.unwrap();

    assert_eq!(raw.segments.len(), 2);
    assert_eq!(raw.segments[0].id, "manual_p1");
    assert_eq!(raw.segments[1].metadata["page"], "2");
    assert!(raw.segments[0].text.contains("Warranty"), "{:?}", raw.segments[0].text);
    assert!(raw.segments[1].text.contains("Cleaning"), "{:?}", raw.segments[1].text);
}

#[tokio::test]
async fn corrupt_pdf_is_an_ingestion_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"not a pdf").unwrap();

    let err = FileLoader::new().load(&path).await.unwrap_err();
    assert!(matches!(err, RagError::Ingestion(ref m) if m.contains("broken.pdf")));
}
