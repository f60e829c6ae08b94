//! ECS resources shared by the systems.
//!
//! Overview
//! - `catalogstore` – compiled, read-only action and behavior tables per pack
//! - `commandbridge` – channel for commands produced outside the tick
//! - `environment` – screen size and boundary lines
//! - `packdata` – serde pack records and their compilation
//! - `petconfig` – INI-backed configuration and the staged replacement
//! - `worldtime` – simulation time and delta
pub mod catalogstore;
pub mod commandbridge;
pub mod environment;
pub mod packdata;
pub mod petconfig;
pub mod worldtime;
