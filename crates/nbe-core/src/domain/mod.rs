//! Domain types shared by the codec and the bridge.
//!
//! Nothing in here touches sockets or keys; these are the values that flow
//! through the protocol once the bytes have been decoded.

/// Setting paths (`category.key`, `category.*`, `*`).
pub mod path;
/// Typed response values and the precision-fixed decimal.
pub mod value;
