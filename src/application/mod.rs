//! Application services orchestrating the domain ports.
//!
//! [`pipeline::PipelineOrchestrator`] turns provider calls into artifacts,
//! [`payments::PaymentStateMachine`] settles them from gateway webhooks and
//! hands approved ones to [`fulfillment::FulfillmentDispatcher`].

pub mod catalog;
pub mod fulfillment;
pub mod payments;
pub mod pipeline;
pub mod signature;
