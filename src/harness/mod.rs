//! Harness module - sends stimuli to a bot and collects its responses.

pub mod collector;
pub mod controller;
pub mod error;
pub mod expectation;
pub mod filter;
pub mod message;
pub mod record;
pub mod registry;
pub mod response;
pub mod subscription;
pub mod telegram;
pub mod throttle;
pub mod timeouts;
pub mod transport;


pub use collector::ResponseCollector;
pub use controller::BotController;
pub use error::CollectError;
pub use expectation::Expectation;
pub use filter::Filter;
pub use message::{Message, MessageEvent};
pub use registry::DispatchRegistry;
pub use response::Response;
pub use telegram::TelegramTransport;
pub use timeouts::TimeoutPolicy;
pub use transport::{Transport, TransportError};
