//! Core engine: reference resolution, pricing, and the live loop.

pub mod resolver;
pub mod pricing;
pub mod volatility;
pub mod tracker;
pub mod sampler;
