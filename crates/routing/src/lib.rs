//! Destination routing and share selection
//!
//! - [`MappingTable`]: rules loaded from the tab-separated mapping file
//! - [`DestinationRouter`]: archive folder and share ids per dataset
//! - [`ShareFinder`]: pluggable choice of the share to unarchive into

#![warn(missing_docs)]

pub mod mapping;
pub mod router;
pub mod share_finder;

pub use mapping::{MappingRule, MappingTable};
pub use router::DestinationRouter;
pub use share_finder::{
    MappingShareFinder, ShareFinder, ShareFinderContext, ShareFinderFactory,
    ShareFinderRegistry, SimpleShareFinder,
};
