pub mod dice;
pub mod errors;
pub mod ids;
pub mod model;
pub mod mutation;
pub mod parse;
pub mod protocol;
pub mod registry;
pub mod sink;
pub mod table;

pub use errors::{ClaimError, ProtocolError};
pub use ids::{CharacterId, ConnectionId};
pub use model::{Boss, Character, CustomStat, GameState, Role};
pub use protocol::{ClientMessage, ServerEvent};
pub use sink::EventSink;
pub use table::Table;
