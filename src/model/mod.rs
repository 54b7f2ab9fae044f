//! Document model: main (node) documents, previous (split) documents, and
//! the revision vector used to resolve "is this node live right now".

pub mod node_document;
pub mod previous_document;
pub mod revision;

pub use node_document::{NodeDocument, RangeDescriptor};
pub use previous_document::PreviousDocument;
pub use revision::{HeadRevisionProvider, NodeState, NodeStateResolver, RevisionVector};
