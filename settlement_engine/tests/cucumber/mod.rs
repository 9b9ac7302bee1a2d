mod settlement_world;
mod steps;

pub use settlement_world::SettlementWorld;
