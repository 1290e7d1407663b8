//! Fixture documents built in memory with lopdf

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

pub const DUMMY_CREATION_DATE: &str = "D:20070223175637+02'00'";

/// Pages tree under construction
struct Builder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl Builder {
    fn new() -> Self {
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    fn page(&mut self, operations: Vec<Operation>, resources: Dictionary, extra: Dictionary) {
        let content = Content { operations };
        let bytes = content.encode().unwrap();
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, bytes));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        };
        for (key, value) in extra.into_iter() {
            page.set(key.clone(), value.clone());
        }
        let page_id = self.doc.add_object(page);
        self.kids.push(page_id.into());
    }

    fn finish(mut self, info: Option<Dictionary>) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        if let Some(info) = info {
            let info_id = self.doc.add_object(info);
            self.doc.trailer.set("Info", info_id);
        }
        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).unwrap();
        bytes
    }
}

fn font_resources(doc: &mut Document) -> Dictionary {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    dictionary! { "Font" => dictionary! { "F1" => font_id } }
}

fn text_line(x: i64, y: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// One page reading "Dummy PDF file", written by "Writer"
pub fn dummy_pdf() -> Vec<u8> {
    let mut builder = Builder::new();
    let resources = font_resources(&mut builder.doc);
    builder.page(text_line(72, 700, "Dummy PDF file"), resources, Dictionary::new());
    builder.finish(Some(dictionary! {
        "Creator" => Object::string_literal("Writer"),
        "Producer" => Object::string_literal("OpenOffice.org 2.1"),
        "CreationDate" => Object::string_literal(DUMMY_CREATION_DATE),
    }))
}

fn link(url: &str, y: i64) -> Object {
    Object::Dictionary(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => vec![72.into(), y.into(), 300.into(), (y + 14).into()],
        "A" => dictionary! {
            "S" => "URI",
            "URI" => Object::string_literal(url),
        },
    })
}

pub const LINKS: [&str; 4] = [
    "https://example.com/one",
    "https://example.com/two",
    "https://example.com/three",
    "https://example.com/four",
];

/// Two pages with two URI link annotations each, plus one with an empty URI
pub fn links_pdf() -> Vec<u8> {
    let mut builder = Builder::new();
    for (page, urls) in LINKS.chunks(2).enumerate() {
        let resources = font_resources(&mut builder.doc);
        let mut annots: Vec<Object> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| link(url, 700 - 20 * i as i64))
            .collect();
        if page == 1 {
            annots.push(link("", 600));
        }
        builder.page(
            text_line(72, 700, &format!("Links page {}", page + 1)),
            resources,
            dictionary! { "Annots" => annots },
        );
    }
    builder.finish(None)
}

fn image_page(image: Dictionary, pixels: Vec<u8>) -> Vec<u8> {
    let mut builder = Builder::new();
    let image_id = builder.doc.add_object(Stream::new(image, pixels));
    let operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![100.into(), 0.into(), 0.into(), 100.into(), 50.into(), 600.into()],
        ),
        Operation::new("Do", vec!["Im0".into()]),
        Operation::new("Q", vec![]),
        Operation::new("rg", vec![0.into(), 0.into(), 1.into()]),
        Operation::new("re", vec![300.into(), 300.into(), 50.into(), 50.into()]),
        Operation::new("f", vec![]),
    ];
    builder.page(
        operations,
        dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
        Dictionary::new(),
    );
    builder.finish(None)
}

/// One page painting a 2x2 RGB image (red, green, blue, white)
pub fn image_pdf() -> Vec<u8> {
    image_page(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255],
    )
}

/// One page painting an image that claims 1000000x1000000 1-bit samples but
/// carries 16 bytes
pub fn huge_image_pdf() -> Vec<u8> {
    image_page(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1_000_000,
            "Height" => 1_000_000,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 1,
        },
        vec![0xAA; 16],
    )
}
