// Component B: uplink side.
// Wake scheduling, the transmitter task and the network sink it drains into.

pub mod scheduler;
pub mod transmitter;
pub mod transport;
