//! Pure stages of the retrieval, fusion and grounded answering pipeline.
//!
//! Nothing here performs I/O. Every stage takes the previous stage's output by reference and
//! returns a new value, so stages can be tested in isolation with fixed parameters.

pub mod citations;
pub mod context;
pub mod facets;
pub mod fusion;
pub mod grounding;
pub mod highlight;
pub mod rerank;
pub mod types;

pub use citations::{CitationValidation, DropReason, DroppedCitation};
pub use context::{AssembledContext, ContextAssembler};
pub use facets::FacetCounts;
pub use fusion::RrfFusion;
pub use grounding::{AbstainReason, AskPhase, AskStateMachine, GroundingPolicy, Verdict};
pub use highlight::Highlighter;
pub use types::{
	ChunkRecord, Citation, ContextChunk, FusedCandidate, Query, RerankedCandidate,
	RetrievalCandidate, RetrievalSource, Span,
};
