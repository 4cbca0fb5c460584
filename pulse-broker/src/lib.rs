//! Bounded, lossy, multi-subscriber event bus
//!
//! The broker fans serialized events out to any number of live
//! subscribers. Each subscriber owns a bounded queue; a subscriber that
//! cannot keep up skips messages rather than slowing the publisher down.
//! Publishing never blocks and never fails.

mod broker;

pub use broker::{EventBroker, Subscriber, SUBSCRIBER_QUEUE_CAPACITY};
