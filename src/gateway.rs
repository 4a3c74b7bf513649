pub mod ddb;
pub mod events;
pub mod logs;
pub mod sns;
pub mod factory;

// GatewayPublisherVia selects where domain events go after a commit
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum GatewayPublisherVia {
    Sns,
    LocalDynamoDB,
    Logs,
}
