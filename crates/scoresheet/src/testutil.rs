//! Shared helpers for unit tests.

/// Builds a minimal valid PDF with one text page per entry in `pages`.
/// An empty string produces a page without a content stream.
pub(crate) fn build_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.new_object_id();
    let resources_id = doc.new_object_id();

    doc.objects.insert(
        font_id,
        Object::Dictionary(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        }),
    );
    doc.objects.insert(
        resources_id,
        Object::Dictionary(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        }),
    );

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let page_id = doc.new_object_id();

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
        };

        if !text.is_empty() {
            let mut content = String::from("BT /F1 10 Tf 40 750 Td 14 TL\n");
            for line in text.lines() {
                let escaped = line.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)");
                content.push_str(&format!("({}) Tj T*\n", escaped));
            }
            content.push_str("ET");

            let content_id = doc.new_object_id();
            doc.objects.insert(
                content_id,
                Object::Stream(Stream::new(dictionary! {}, content.into_bytes())),
            );
            page_dict.set("Contents", content_id);
        }

        doc.objects.insert(page_id, Object::Dictionary(page_dict));
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
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
