//! Client-side synchronization layer for the per-user course collections
//! (wishlist, cart, enrollments).
//!
//! The marketplace service is consumed, not trusted: listing responses come
//! back in several shapes, deletion and patching key on an opaque entry id
//! the listings do not always expose, and detail lookups fail often enough
//! that every read degrades instead of erroring. The layer is split into a
//! pure normalizer, an on-demand entry resolver, a best-effort hydrator,
//! and the one stateful piece, [`CollectionStore`].

mod hydrate;
mod normalize;
mod resolve;
mod store;

pub use hydrate::{hydrate, hydrate_one};
pub use normalize::{NormalizedCollection, normalize};
pub use resolve::resolve_entry;
pub use store::{CollectionState, CollectionStore};
