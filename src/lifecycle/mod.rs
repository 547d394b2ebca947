pub mod events;
pub mod state_machine;

pub use events::{ChannelSink, EventSink, PoolEvent};
pub use state_machine::{AgreementEvent, AgreementStateMachine};
