//! Global critical-point search through polynomial approximation.
//!
//! A black-box objective is sampled on a tensor grid, fitted with an
//! orthogonal-polynomial expansion, and the real zeros of the expansion's
//! gradient are taken as starting points for Newton refinement against the
//! objective itself. [`orchestrate::Orchestrator`] runs the whole pipeline
//! over several tolerances and subdomains.

pub mod approx;
pub mod basis;
pub mod config;
pub mod critical;
pub mod domain;
pub mod error;
pub mod expr;
pub mod opts;
pub mod orchestrate;
pub mod poly;
pub mod refine;
pub mod solve;
pub mod utils;

pub use error::Error;
