// Viewer endpoints. Every handler except the probes runs behind the identity
// and tenant middleware and receives the tenant's `MapViewer` as extension.
pub mod assets;
pub mod config;
pub mod edit_config;
pub mod health;
pub mod index;
pub mod themes;
pub mod user_info;

pub use assets::extracted_image; // GET /assets/img/base64/*path
pub use config::config; // GET /config.json
pub use edit_config::edit_config; // GET /editConfig.json
pub use health::{healthz, ready}; // GET /healthz, GET /ready
pub use index::index; // GET /
pub use themes::themes; // GET /themes.json
pub use user_info::set_user_info; // GET|POST /setuserinfo
