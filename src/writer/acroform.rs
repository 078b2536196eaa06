//! Interactive form dictionary updates for signature fields.
//!
//! Signing adds one field to the document-level `/AcroForm` dictionary and
//! raises its signature flags. Everything already present in the form
//! (fields, default resources, appearance settings) is carried over.

use crate::object::{Dict, Object, ObjectRef};

/// `/SigFlags` bit 1: the document contains at least one signature.
pub const SIG_FLAG_SIGNATURES_EXIST: i64 = 1;
/// `/SigFlags` bit 2: the document must only be saved incrementally.
pub const SIG_FLAG_APPEND_ONLY: i64 = 2;

/// Builder that folds new signature fields into an `/AcroForm` dictionary.
///
/// ```
/// use certigo::object::{Object, ObjectRef};
/// use certigo::writer::AcroFormUpdate;
///
/// let form = AcroFormUpdate::new()
///     .add_field(ObjectRef::new(12, 0))
///     .signatures_exist()
///     .append_only()
///     .build();
/// assert_eq!(form.get("SigFlags"), Some(&Object::Integer(3)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AcroFormUpdate {
    base: Dict,
    existing_fields: Vec<Object>,
    new_fields: Vec<ObjectRef>,
    sig_flags: i64,
}

impl AcroFormUpdate {
    /// Start from an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing form dictionary whose `/Fields` array has
    /// already been resolved.
    pub fn from_existing(mut form: Dict, resolved_fields: Vec<Object>) -> Self {
        form.remove("Fields");
        let sig_flags = form
            .remove("SigFlags")
            .and_then(|o| o.as_integer())
            .unwrap_or(0);
        Self {
            base: form,
            existing_fields: resolved_fields,
            new_fields: Vec::new(),
            sig_flags,
        }
    }

    /// Append a field reference.
    pub fn add_field(mut self, field_ref: ObjectRef) -> Self {
        self.new_fields.push(field_ref);
        self
    }

    /// Mark document as containing signatures.
    pub fn signatures_exist(mut self) -> Self {
        self.sig_flags |= SIG_FLAG_SIGNATURES_EXIST;
        self
    }

    /// Mark document as append-only.
    pub fn append_only(mut self) -> Self {
        self.sig_flags |= SIG_FLAG_APPEND_ONLY;
        self
    }

    /// Number of fields the built dictionary will list.
    pub fn field_count(&self) -> usize {
        self.existing_fields.len() + self.new_fields.len()
    }

    /// Produce the updated form dictionary.
    pub fn build(self) -> Dict {
        let mut dict = self.base;
        let fields = self
            .existing_fields
            .into_iter()
            .chain(self.new_fields.into_iter().map(Object::Reference))
            .collect();
        dict.insert("Fields".to_string(), Object::Array(fields));
        if self.sig_flags != 0 {
            dict.insert("SigFlags".to_string(), Object::Integer(self.sig_flags));
        }
        dict
    }
}
