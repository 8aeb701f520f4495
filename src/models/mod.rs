//! Wire and storage types, split by domain the way `routes/` is split by
//! domain in the same codebase — each concern's shapes live with its name.

mod auth;
mod file;
mod friend;
mod group;
mod message;
mod p2p;
mod presence;
mod room;
mod voice;

pub use auth::*;
pub use file::*;
pub use friend::*;
pub use group::*;
pub use message::*;
pub use p2p::*;
pub use presence::*;
pub use room::*;
pub use voice::*;

pub(crate) fn default_true() -> bool {
    true
}
