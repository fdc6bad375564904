pub mod actions;
pub mod config;
pub mod control;
pub mod discovery;
pub mod dispatcher;
pub mod editor;
pub mod endpoint;
pub mod project;
pub mod reconcile;
pub mod reducer;
pub mod selection;
pub mod session;
pub mod state;

pub use actions::*;
pub use reducer::*;
pub use state::*;

pub use config::Config;
pub use control::ControlError;
pub use control::SessionControl;
pub use discovery::ProjectDiscovery;
pub use project::Project;
pub use session::SessionRecord;
