mod core;
mod draft;
mod error;
mod events;
mod html;
mod locate;
mod node;
mod ops;
mod plugin;
mod plugins;
mod resolve;
mod schema;
mod selection;
mod serde_value;

pub use crate::core::*;
pub use crate::draft::*;
pub use crate::error::*;
pub use crate::events::*;
pub use crate::html::*;
pub use crate::locate::*;
pub use crate::node::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::plugins::*;
pub use crate::resolve::*;
pub use crate::schema::*;
pub use crate::selection::*;
pub use crate::serde_value::*;
