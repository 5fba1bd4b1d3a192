//! PDF concatenation.
//!
//! [`PdfMerger`] accumulates parsed source documents and produces one
//! document whose page sequence is the concatenation of each input's pages,
//! in append order. Inputs are read-only; no page reordering, deduplication
//! or renumbering across documents happens beyond what serialization
//! requires.

use std::collections::BTreeMap;

use lopdf::{dictionary, Document, Object, ObjectId};
use tracing::debug;

/// Errors from parsing or assembling PDF documents.
#[derive(Debug)]
pub enum MergeError {
    /// A source document could not be parsed, or the result could not be
    /// serialized.
    Pdf(lopdf::Error),
    /// A source document contains no pages.
    NoPages,
    /// A source document lacks a required structural object.
    MissingRoot(&'static str),
    /// Writing the serialized document failed.
    Io(std::io::Error),
}

impl std::fmt::Display for MergeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeError::Pdf(e) => write!(f, "pdf error: {e}"),
            MergeError::NoPages => write!(f, "document has no pages"),
            MergeError::MissingRoot(what) => write!(f, "document has no {what} object"),
            MergeError::Io(e) => write!(f, "serialization error: {e}"),
        }
    }
}

impl std::error::Error for MergeError {}

impl From<lopdf::Error> for MergeError {
    fn from(e: lopdf::Error) -> Self {
        MergeError::Pdf(e)
    }
}

impl From<std::io::Error> for MergeError {
    fn from(e: std::io::Error) -> Self {
        MergeError::Io(e)
    }
}

/// Page attributes that may live on a Pages ancestor instead of the page.
const INHERITED_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"Rotate", b"CropBox"];

/// Copy attributes the page inherits from its Pages ancestors onto the page
/// dictionary itself. The nearest ancestor wins, matching PDF inheritance.
fn inherit_page_attributes(page: &mut lopdf::Dictionary, doc: &Document) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    while let Some(id) = parent {
        let Ok(node) = doc.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        for key in INHERITED_PAGE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
}

/// Number of pages in a serialized PDF.
pub fn page_count(bytes: &[u8]) -> Result<usize, MergeError> {
    let doc = Document::load_mem(bytes)?;
    Ok(doc.get_pages().len())
}

/// Accumulates documents and concatenates their pages in append order.
#[derive(Default)]
pub struct PdfMerger {
    documents: Vec<Document>,
}

impl PdfMerger {
    pub fn new() -> Self {
        PdfMerger::default()
    }

    /// Parse one source document and queue its pages. Returns the page
    /// count of the appended document.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize, MergeError> {
        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages().len();
        if pages == 0 {
            return Err(MergeError::NoPages);
        }
        debug!(pages, "queued source document");
        self.documents.push(doc);
        Ok(pages)
    }

    /// Total pages queued so far.
    pub fn page_count(&self) -> usize {
        self.documents.iter().map(|d| d.get_pages().len()).sum()
    }

    /// Assemble the concatenated document and serialize it.
    pub fn finish(mut self) -> Result<Vec<u8>, MergeError> {
        if self.documents.is_empty() {
            return Err(MergeError::NoPages);
        }

        // Renumber each document into a disjoint id range, then collect
        // page dictionaries in page order and all objects for the rebuild
        // below.
        let mut max_id = 1;
        let mut page_objects: Vec<(ObjectId, lopdf::Dictionary)> = Vec::new();
        let mut all_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

        for doc in &mut self.documents {
            doc.renumber_objects_with(max_id);
            max_id = doc.max_id + 1;
            // get_pages is keyed by page number, so iteration preserves the
            // document's own page order.
            for (_number, page_id) in doc.get_pages() {
                let mut dict = doc.get_object(page_id)?.as_dict()?.clone();
                // The original Pages chain does not survive the merge, so
                // inherited attributes must move onto the page itself.
                inherit_page_attributes(&mut dict, doc);
                page_objects.push((page_id, dict));
            }
            all_objects.extend(std::mem::take(&mut doc.objects));
        }

        let mut merged = Document::with_version("1.5");
        let mut catalog: Option<(ObjectId, lopdf::Dictionary)> = None;
        let mut pages_id: Option<ObjectId> = None;

        for (object_id, object) in all_objects {
            let kind: Vec<u8> = object
                .as_dict()
                .ok()
                .and_then(|d| d.get(b"Type").ok())
                .and_then(|t| match t {
                    Object::Name(name) => Some(name.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            match kind.as_slice() {
                b"Catalog" => {
                    // Keep the first catalog encountered.
                    if catalog.is_none() {
                        if let Ok(dict) = object.as_dict() {
                            catalog = Some((object_id, dict.clone()));
                        }
                    }
                }
                b"Pages" => {
                    // Keep one id for the rebuilt page tree root; the nodes
                    // themselves are dropped, their attributes now live on
                    // the pages.
                    if pages_id.is_none() {
                        pages_id = Some(object_id);
                    }
                }
                // Pages are re-inserted with a corrected Parent below;
                // outline trees are dropped from the merged result.
                b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    merged.objects.insert(object_id, object);
                }
            }
        }

        let pages_id = pages_id.ok_or(MergeError::MissingRoot("Pages"))?;
        let (catalog_id, mut catalog_dict) = catalog.ok_or(MergeError::MissingRoot("Catalog"))?;

        for (page_id, dict) in &page_objects {
            let mut dict = dict.clone();
            dict.set("Parent", pages_id);
            merged.objects.insert(*page_id, Object::Dictionary(dict));
        }

        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Count" => page_objects.len() as i64,
            "Kids" => page_objects
                .iter()
                .map(|(id, _)| Object::Reference(*id))
                .collect::<Vec<_>>(),
        };
        merged.objects.insert(pages_id, Object::Dictionary(pages_dict));

        catalog_dict.set("Pages", pages_id);
        catalog_dict.remove(b"Outlines");
        merged
            .objects
            .insert(catalog_id, Object::Dictionary(catalog_dict));

        merged.trailer.set("Root", catalog_id);
        merged.max_id = merged.objects.len() as u32;
        merged.renumber_objects();
        merged.compress();

        let mut out = Vec::new();
        merged.save_to(&mut out)?;
        debug!(
            pages = page_objects.len(),
            bytes = out.len(),
            "serialized merged document"
        );
        Ok(out)
    }
}
