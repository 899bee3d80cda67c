pub mod anchors;
pub mod error;
pub mod html;
pub mod page;
pub mod paths;
pub mod resolve;
pub mod site;

pub use error::BuildError;
pub use page::PageOptions;
pub use resolve::{UnresolvedReference, resolve};
pub use site::{BuildOptions, BuildReport, ParseFailure, Site};
