//! Trigger-driven Wake-on-LAN dispatch: build the 102-byte magic packet for
//! a configured hardware address, broadcast it over UDP, and throttle bursts
//! of triggers with a per-target cooldown gate. The embedding host wires
//! [`dispatch::Dispatcher`] into its own request flow.

pub mod dispatch;
pub mod mac;
pub mod throttle;
pub mod wol;
