//! PDF document model.
//!
//! A [`PdfDocument`] owns the complete bytes of a source file and resolves
//! objects through its cross-reference chain on demand. Signing never
//! rewrites these bytes; it reads the catalog, page tree and form
//! dictionary to decide what the incremental update has to replace.

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_indirect_object;
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntryType, XRefKind};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Maximum depth when walking the page tree or nested form fields.
const MAX_TREE_DEPTH: usize = 64;

/// A terminal interactive form field found in the document.
#[derive(Debug, Clone)]
pub struct FormField {
    /// Indirect reference of the field dictionary, when it has one
    pub field_ref: Option<ObjectRef>,
    /// Fully qualified field name (`parent.child`)
    pub name: String,
    /// The field dictionary itself
    pub dict: Dict,
}

impl FormField {
    /// Field type (`/FT`), possibly inherited from a parent.
    pub fn field_type(&self) -> Option<&str> {
        self.dict.get("FT").and_then(|o| o.as_name())
    }
}

/// PDF document held in memory.
///
/// # Example
///
/// ```no_run
/// use certigo::document::PdfDocument;
///
/// let mut doc = PdfDocument::open("certificate.pdf")?;
/// println!("PDF version: {}.{}", doc.version().0, doc.version().1);
/// let page = doc.page_ref(0)?;
/// # Ok::<(), certigo::Error>(())
/// ```
pub struct PdfDocument {
    data: Vec<u8>,
    version: (u8, u8),
    xref: CrossRefTable,
    xref_offset: u64,
    trailer: Dict,
    object_cache: HashMap<ObjectRef, Object>,
    resolving: HashSet<ObjectRef>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("len", &self.data.len())
            .field("xref_entries", &self.xref.len())
            .field("xref_kind", &self.xref.kind())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Read and parse a PDF file.
    ///
    /// A missing or unreadable file is an input error, like a malformed one.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = Error::read_input(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Parse a PDF held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = parse_header(&data)?;
        let xref_offset = find_xref_offset(&data)?;
        let xref = parse_xref(&data, xref_offset)?;

        let trailer = xref
            .trailer()
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("missing trailer dictionary".to_string()))?;
        if trailer.get("Root").and_then(|o| o.as_reference()).is_none() {
            return Err(Error::InvalidPdf("trailer missing /Root reference".to_string()));
        }
        if trailer.contains_key("Encrypt") {
            return Err(Error::InvalidPdf("encrypted documents cannot be signed".to_string()));
        }

        log::debug!(
            "Parsed PDF {}.{}: {} bytes, {} xref entries ({:?})",
            version.0,
            version.1,
            data.len(),
            xref.len(),
            xref.kind()
        );

        Ok(Self {
            data,
            version,
            xref,
            xref_offset,
            trailer,
            object_cache: HashMap::new(),
            resolving: HashSet::new(),
        })
    }

    /// Raw bytes of the document.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the document, returning its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// PDF version (major, minor) from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Trailer of the newest revision.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Offset of the newest cross-reference section.
    pub fn xref_offset(&self) -> u64 {
        self.xref_offset
    }

    /// Syntax of the newest cross-reference section.
    pub fn xref_kind(&self) -> XRefKind {
        self.xref.kind()
    }

    /// First object number free for new objects.
    pub fn next_object_number(&self) -> u32 {
        let size = self
            .trailer
            .get("Size")
            .and_then(|o| o.as_integer())
            .unwrap_or(0)
            .max(0) as u32;
        size.max(self.xref.max_object_number() + 1)
    }

    /// Load an indirect object through the cross-reference table.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.object_cache.get(&obj_ref) {
            return Ok(cached.clone());
        }
        if !self.resolving.insert(obj_ref) {
            return Err(Error::CircularReference(obj_ref));
        }

        let result = self.load_object_uncached(obj_ref);
        self.resolving.remove(&obj_ref);

        let obj = result?;
        self.object_cache.insert(obj_ref, obj.clone());
        Ok(obj)
    }

    fn load_object_uncached(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        let entry = self
            .xref
            .get(obj_ref.id)
            .cloned()
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;

        match entry.entry_type {
            XRefEntryType::Uncompressed => {
                let offset = entry.offset as usize;
                let input = self
                    .data
                    .get(offset..)
                    .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))?;
                let (_, (found, obj)) =
                    parse_indirect_object(input).map_err(|e| Error::ParseError {
                        offset,
                        reason: format!("object {}: {:?}", obj_ref, e),
                    })?;
                if found.id != obj_ref.id {
                    return Err(Error::ParseError {
                        offset,
                        reason: format!("expected object {}, found {}", obj_ref, found),
                    });
                }
                Ok(obj)
            },
            XRefEntryType::Compressed => {
                let stream_ref = ObjectRef::new(entry.offset as u32, 0);
                let stream = self.load_object(stream_ref)?;
                let objects = parse_object_stream(&stream)?;
                for (id, obj) in objects {
                    // Later revisions may have replaced some of the packed objects
                    let current = self.xref.get(id).is_some_and(|e| {
                        e.entry_type == XRefEntryType::Compressed && e.offset == entry.offset
                    });
                    if current {
                        self.object_cache.entry(ObjectRef::new(id, 0)).or_insert(obj);
                    }
                }
                self.object_cache
                    .get(&obj_ref)
                    .cloned()
                    .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))
            },
            XRefEntryType::Free => Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        }
    }

    /// Resolve one level of indirection.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(r) => self.load_object(*r),
            other => Ok(other.clone()),
        }
    }

    /// Resolve an object that must be a dictionary.
    pub fn resolve_dict(&mut self, obj: &Object) -> Result<Dict> {
        let resolved = self.resolve(obj)?;
        let found = resolved.type_name();
        resolved.into_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: found.to_string(),
        })
    }

    /// Reference to the document catalog (`/Root`).
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer
            .get("Root")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("trailer missing /Root reference".to_string()))
    }

    /// Load the document catalog.
    pub fn catalog(&mut self) -> Result<Dict> {
        let root = self.catalog_ref()?;
        self.resolve_dict(&Object::Reference(root))
    }

    /// Find the page object at `page_index` (zero based).
    pub fn page_ref(&mut self, page_index: usize) -> Result<ObjectRef> {
        let catalog = self.catalog()?;
        let pages_ref = catalog
            .get("Pages")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("catalog missing /Pages reference".to_string()))?;

        let mut remaining = page_index;
        self.find_page(pages_ref, &mut remaining, 0)?
            .ok_or_else(|| Error::InvalidPdf(format!("page {} not found", page_index)))
    }

    fn find_page(
        &mut self,
        node_ref: ObjectRef,
        remaining: &mut usize,
        depth: usize,
    ) -> Result<Option<ObjectRef>> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::InvalidPdf("page tree too deep".to_string()));
        }
        let node = self.resolve_dict(&Object::Reference(node_ref))?;

        let is_leaf = match node.get("Type").and_then(|o| o.as_name()) {
            Some("Page") => true,
            Some("Pages") => false,
            _ => !node.contains_key("Kids"),
        };
        if is_leaf {
            if *remaining == 0 {
                return Ok(Some(node_ref));
            }
            *remaining -= 1;
            return Ok(None);
        }

        let kids = match node.get("Kids") {
            Some(kids) => self.resolve(kids)?,
            None => return Ok(None),
        };
        for kid in kids.as_array().map(|a| a.as_slice()).unwrap_or_default() {
            if let Some(kid_ref) = kid.as_reference() {
                if let Some(found) = self.find_page(kid_ref, remaining, depth + 1)? {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    /// The interactive form dictionary, if the catalog has one.
    pub fn acroform(&mut self) -> Result<Option<Dict>> {
        let catalog = self.catalog()?;
        match catalog.get("AcroForm") {
            Some(form) => self.resolve_dict(form).map(Some),
            None => Ok(None),
        }
    }

    /// All terminal form fields reachable from `/AcroForm /Fields`.
    ///
    /// Inheritable `/FT` values are copied down from parents.
    pub fn form_fields(&mut self) -> Result<Vec<FormField>> {
        let Some(form) = self.acroform()? else {
            return Ok(Vec::new());
        };
        let roots = match form.get("Fields") {
            Some(fields) => self.resolve(fields)?,
            None => return Ok(Vec::new()),
        };

        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        for root in roots.as_array().map(|a| a.as_slice()).unwrap_or_default() {
            self.collect_fields(root, "", None, &mut fields, &mut seen, 0)?;
        }
        Ok(fields)
    }

    fn collect_fields(
        &mut self,
        node: &Object,
        parent_name: &str,
        inherited_ft: Option<&Object>,
        out: &mut Vec<FormField>,
        seen: &mut HashSet<ObjectRef>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::InvalidPdf("form field tree too deep".to_string()));
        }
        let field_ref = node.as_reference();
        if let Some(r) = field_ref {
            if !seen.insert(r) {
                return Ok(());
            }
        }

        let mut dict = self.resolve_dict(node)?;
        let partial = dict
            .get("T")
            .and_then(|o| o.as_string())
            .map(|t| String::from_utf8_lossy(t).into_owned());
        let name = match (parent_name.is_empty(), partial) {
            (_, None) => parent_name.to_string(),
            (true, Some(t)) => t,
            (false, Some(t)) => format!("{}.{}", parent_name, t),
        };

        if let (false, Some(ft)) = (dict.contains_key("FT"), inherited_ft) {
            dict.insert("FT".to_string(), ft.clone());
        }

        let kids = match dict.get("Kids") {
            Some(kids) => self.resolve(kids)?,
            None => Object::Array(Vec::new()),
        };
        // Kids without /T are widget annotations of this field
        let child_fields: Vec<Object> = kids
            .as_array()
            .map(|a| a.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(|kid| self.kid_is_field(kid))
            .cloned()
            .collect();

        if child_fields.is_empty() {
            out.push(FormField {
                field_ref,
                name,
                dict,
            });
            return Ok(());
        }

        let ft = dict.get("FT").cloned();
        for kid in &child_fields {
            self.collect_fields(kid, &name, ft.as_ref(), out, seen, depth + 1)?;
        }
        Ok(())
    }

    fn kid_is_field(&mut self, kid: &Object) -> bool {
        self.resolve(kid)
            .ok()
            .and_then(|k| k.into_dict())
            .is_some_and(|d| d.contains_key("T"))
    }
}

/// Check the `%PDF-M.m` header and return the version.
///
/// The header may be preceded by up to 1024 bytes of junk.
///
/// ```
/// use certigo::document::parse_header;
///
/// assert_eq!(parse_header(b"%PDF-1.7\n").unwrap(), (1, 7));
/// assert!(parse_header(b"GIF89a").is_err());
/// ```
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let pos = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| {
            Error::InvalidHeader(String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned())
        })?;

    let version = &data[pos + 5..];
    match version {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => Ok((major - b'0', minor - b'0')),
        _ => Err(Error::InvalidHeader(
            String::from_utf8_lossy(&data[pos..data.len().min(pos + 8)]).into_owned(),
        )),
    }
}
