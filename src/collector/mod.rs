//! Collector: the per-venue WebSocket connection lifecycle (§4.B, §5).
//!
//! One collector task is spawned per enabled exchange; it owns the
//! connection state machine and forwards decoded trade batches onto the
//! shared Trade Bus. Exchange-specific logic lives entirely in adapters —
//! this layer is the generic runtime around them.
pub mod runner;
