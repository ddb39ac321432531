//! Typesetters for the sublanguages embedded in markdown: math runs inside the
//! synchronous pass, diagrams after commit.

pub mod diagram;
pub mod math;

pub use diagram::{
    DiagramError, DiagramFuture, DiagramIdGenerator, DiagramIds, DiagramNode, DiagramTheme,
    DiagramTypesetter, MermaidCli,
};
#[cfg(feature = "katex")]
pub use math::KatexMath;
pub use math::{MarkupMath, MathError, MathTypesetter};
