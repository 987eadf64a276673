//! structural::core — parameter contract, structural items and system types.
//!
//! - [`domain`]: admissible regions and projection of parameter blocks.
//! - [`params`]: [`params::ParameterInterpreter`] and the index cursor
//!   [`params::ParamReader`].
//! - [`items`]: the [`items::ModelItem`] sum type and its
//!   [`items::Registration`] trait.
//! - [`blocks`]: catalog of structural blocks and their state-space systems.
//! - [`ssf`]: the composite system and its builder.
//! - [`options`]: filter and monitor configuration.

pub mod blocks;
pub mod domain;
pub mod items;
pub mod options;
pub mod params;
pub mod ssf;
