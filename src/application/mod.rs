pub mod accountant;
pub mod fraud;
pub mod orchestrator;
pub mod reconciler;
pub mod redemption;
pub mod settlement;
