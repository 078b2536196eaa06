//! PDF writing for incremental updates.
//!
//! ## Architecture
//!
//! ```text
//! PdfDocument (source bytes, untouched)
//!     ↓
//! [AcroFormUpdate] (form dictionary with the new signature field)
//!     ↓
//! [IncrementalUpdate] (new and replaced objects, new xref section)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! source bytes + appended update
//! ```

mod acroform;
mod incremental;
mod object_serializer;

pub use acroform::{AcroFormUpdate, SIG_FLAG_APPEND_ONLY, SIG_FLAG_SIGNATURES_EXIST};
pub use incremental::{IncrementalUpdate, UpdateOutput};
pub(crate) use incremental::find;
pub use object_serializer::ObjectSerializer;
pub(crate) use object_serializer::hex_upper;
