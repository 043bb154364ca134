//! Payslip workflows: extraction, indexing, retrieval and comparison.

pub mod ask;
pub mod comparator;
pub mod compare;
pub mod definitions;
pub mod extraction;
pub mod indexer;
pub mod section;
pub mod similarity;

#[cfg(test)]
pub(crate) mod fixtures;

pub use ask::AskService;
pub use comparator::compare_payslips;
pub use compare::CompareService;
pub use definitions::{preload_definitions, SemanticDefinitionMatcher};
pub use extraction::PayslipExtractor;
pub use indexer::PayslipIndexer;
pub use section::SectionService;
pub use similarity::SimilarityService;
