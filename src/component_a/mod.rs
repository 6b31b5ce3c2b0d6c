// Component A: acquisition side.
// Readings come in from the producer, get filtered against the last
// accepted value and wait in the bounded queue for the uplink.

pub mod filter;
pub mod queue;
pub mod sensor;
