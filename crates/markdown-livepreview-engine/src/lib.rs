pub mod convert;
pub mod extract;
pub mod io;
pub mod pipeline;
pub mod previewer;
pub mod sanitize;
pub mod stats;
pub mod surface;
pub mod toc;
pub mod typeset;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use extract::{Extracted, FragmentKind, Placement, ProtectedFragment, extract};
pub use io::*;
pub use pipeline::{PassState, Pipeline, RenderContext, RenderOptions, RenderedDocument, render};
pub use previewer::{PassOutcome, Previewer};
pub use sanitize::{Sanitizer, SanitizerOptions};
pub use stats::{DocumentStats, document_title};
pub use surface::{DiagramSlot, Resolution, Surface};
pub use toc::TocEntry;
pub use typeset::{DiagramIds, DiagramNode, DiagramTypesetter, MermaidCli};
