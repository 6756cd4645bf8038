pub mod agent;

pub use agent::{AgentConfig, AgentHandle, DmAlert, NotificationAgent};
