//! Static analysis passes over parsed events.
//!
//! Passes run in this order when a product is built:
//! 1. `indexer`: variable slots
//! 2. `if_processor`: affected variables and nesting depth
//! 3. `domain_processor`: value domains, fixed conditions, fuzzy windows
//! 4. `const_cond`: collapse of fixed conditions
//! 5. `const_fold`: constant subexpressions

pub mod const_cond;
pub mod const_fold;
pub mod domain;
pub mod domain_processor;
pub mod if_processor;
pub mod indexer;

pub use const_cond::collapse_constant_conditions;
pub use const_fold::fold_constants;
pub use domain::{Bound, Domain, Interval};
pub use domain_processor::DomainProcessor;
pub use if_processor::process_ifs;
pub use indexer::index_variables;
