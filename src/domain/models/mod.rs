mod backend;
mod message;
mod persona;
mod role;

pub use backend::*;
pub use message::*;
pub use persona::*;
pub use role::*;
