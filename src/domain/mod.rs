pub mod events;
pub mod fraud;
pub mod money;
pub mod plan;
pub mod ports;
pub mod redemption;
pub mod transaction;

use uuid::Uuid;

pub type ParticipantId = Uuid;
pub type ProviderId = Uuid;
pub type PlanId = Uuid;
pub type CategoryId = Uuid;
pub type VoucherId = Uuid;
pub type TransactionId = Uuid;
pub type RedemptionId = Uuid;
