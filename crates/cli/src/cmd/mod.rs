mod events;
mod fingerprint;
mod unit;

pub use events::cmd_events;
pub use fingerprint::cmd_fingerprint;
