pub mod collapse;
pub mod dedup;
pub mod merge;
pub mod namespace;
pub mod output;
pub mod ownership;
pub mod pipeline;
pub mod prune;
pub mod script_view;
pub mod search;
pub mod table_view;
pub mod traversal;

pub use collapse::*;
pub use dedup::*;
pub use merge::*;
pub use namespace::*;
pub use output::*;
pub use ownership::*;
pub use pipeline::*;
pub use prune::*;
pub use script_view::*;
pub use search::*;
pub use table_view::*;
pub use traversal::*;
