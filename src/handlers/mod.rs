//! HTTP handlers for the prediction API

pub mod catalog;
pub mod health;
pub mod predict;
