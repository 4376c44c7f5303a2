//! Merge per-file PDF fragments into one document with `lopdf`.
//!
//! Each fragment is loaded, renumbered into a disjoint object-id range and
//! its pages re-parented under a single new page tree, in fragment order.
//! Attributes a page inherits from its old parents (`MediaBox`, `CropBox`,
//! `Resources`, `Rotate`) are copied onto the page first, since those parents
//! are dropped. Unreferenced objects are pruned before saving.

use crate::error::Svg2PdfError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use std::path::PathBuf;
use tracing::debug;

/// Value written to the Info dictionary's `Producer` entry.
pub const PRODUCER: &str = concat!("svgpdf-merge ", env!("CARGO_PKG_VERSION"));

const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Object types that belong to a fragment's document structure rather than
/// its content.
const STRUCTURAL_TYPES: [&[u8]; 6] = [
    b"Catalog",
    b"Pages",
    b"Outlines",
    b"Outline",
    b"ObjStm",
    b"XRef",
];

/// Parent-chain walks stop after this many hops.
const MAX_TREE_DEPTH: usize = 64;

/// The assembled document.
#[derive(Debug)]
pub struct MergedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Concatenate the pages of `fragments`, in order, into one PDF.
///
/// An empty slice produces a valid document with zero pages.
///
/// # Errors
/// [`Svg2PdfError::CorruptFragment`] if a fragment is not a loadable PDF,
/// [`Svg2PdfError::Merge`] if the result cannot be serialised.
pub fn merge_fragments(
    fragments: &[(PathBuf, Vec<u8>)],
    title: Option<&str>,
) -> Result<MergedDocument, Svg2PdfError> {
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: Vec<(ObjectId, Object)> = Vec::new();
    let mut max_id = 1;

    for (path, bytes) in fragments {
        let corrupt = |detail: String| Svg2PdfError::CorruptFragment {
            path: path.clone(),
            detail,
        };

        let mut doc = Document::load_mem(bytes).map_err(|e| corrupt(e.to_string()))?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        debug!("Fragment {} has {} page(s)", path.display(), page_ids.len());

        for page_id in &page_ids {
            let mut page = doc
                .get_dictionary(*page_id)
                .map_err(|e| corrupt(format!("page {page_id:?}: {e}")))?
                .clone();
            for key in INHERITABLE {
                if page.has(key) {
                    continue;
                }
                if let Some(value) = inherited_attribute(&doc, &page, key) {
                    page.set(key, value);
                }
            }
            pages.push((*page_id, page));
        }

        objects.extend(doc.objects.into_iter().filter(|(id, object)| {
            !page_ids.contains(id) && !is_structural(object)
        }));
    }

    let mut document = Document::with_version("1.7");
    document.objects.extend(objects);
    document.max_id = max_id;

    let pages_id = document.new_object_id();
    let page_count = pages.len();
    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();

    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        document.objects.insert(id, Object::Dictionary(page));
    }

    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = document.add_object(info_dictionary(title));

    document.trailer.set("Root", catalog_id);
    document.trailer.set("Info", info_id);

    document.prune_objects();
    document.renumber_objects();
    document.compress();

    let mut bytes = Vec::new();
    document
        .save_to(&mut bytes)
        .map_err(|e| Svg2PdfError::Merge(e.to_string()))?;

    debug!("Merged {} page(s) into {} bytes", page_count, bytes.len());
    Ok(MergedDocument { bytes, page_count })
}

fn info_dictionary(title: Option<&str>) -> Dictionary {
    let mut info = dictionary! {
        "Producer" => Object::string_literal(PRODUCER),
    };
    if let Some(title) = title {
        info.set("Title", text_string(title));
    }
    info
}

/// Encode a PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn type_name(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        _ => return None,
    };
    dict.get(b"Type").ok()?.as_name().ok()
}

fn is_structural(object: &Object) -> bool {
    type_name(object).is_some_and(|t| STRUCTURAL_TYPES.contains(&t))
}

/// Look `key` up along the page's `Parent` chain.
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent_id = page.get(b"Parent").ok()?.as_reference().ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        let parent = doc.get_dictionary(parent_id).ok()?;
        if let Ok(value) = parent.get(key) {
            return Some(value.clone());
        }
        parent_id = parent.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}
