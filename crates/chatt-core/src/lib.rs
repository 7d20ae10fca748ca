pub mod errors;
pub mod events;
pub mod ids;
pub mod message;
pub mod session;

pub use errors::{ApiError, ClientError};
pub use events::ServerEvent;
pub use ids::{MessageId, UserId};
pub use message::{ChatMessage, Draft, MessageBody};
pub use session::Session;
