pub mod client;
pub mod gateway;
pub mod images;
pub mod server;
pub mod session;

pub use gateway::BroadcastGateway;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
pub use session::{SessionActor, SessionCommand};
