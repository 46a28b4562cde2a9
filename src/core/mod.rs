pub mod config;
pub mod error;
pub mod types;

pub use config::{BattleConfig, SettlementConfig, WarfrontConfig, ZoneSearchConfig};
pub use error::{Result, WarfrontError};
pub use types::{ConflictKey, EntityId, FactionId, Rect, Tick, Vec2};
