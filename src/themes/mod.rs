pub mod filter;
pub mod item_filters;
pub mod model;
pub mod tree;
pub mod urls;

pub use filter::{PermittedThemes, ThemeFilter};
pub use model::{EditDataset, ThemeGroup, ThemeItem, ThemesDocument};
pub use urls::apply_service_urls;
