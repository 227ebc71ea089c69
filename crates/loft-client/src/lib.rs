//! Client-side read tracking: a per-message poller that turns the server's
//! tracking endpoint into a displayable read state with a one-way latch.

pub mod api;
pub mod poller;

pub use api::{HttpTrackingApi, TrackingApi};
pub use poller::{DisplayedStatus, StatusPoller};
