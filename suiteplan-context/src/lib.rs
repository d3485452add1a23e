//! Read-only view of what CI scheduled for this build.
//!
//! The build context says which optimizations are switched on and which tests will run (and what
//! they download). The changed-files manifest says what the change under test touched. Both are
//! decoded once and never mutated; every lookup degrades to an empty answer instead of failing.

mod build_context;
mod change_info;
mod load;

pub use build_context::{BuildContext, DOWNLOAD_OPTS, TEST_MAPPING_GROUP_OPT, TestInfo};
pub use change_info::ChangeInfo;
pub use load::{ContextLoadError, load_build_context, load_change_info};
