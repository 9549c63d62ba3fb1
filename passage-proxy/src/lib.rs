pub mod tab_list;

pub use tab_list::{TabList, TabListEntry, TabListError};
