mod app_state;
pub mod formatting;
mod profile;
mod sessions;

pub use app_state::*;
pub use profile::*;
pub use sessions::*;
