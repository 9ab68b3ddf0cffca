//! formstage - Staged Form & Conditional Branch Engine
//!
//! Multi-step forms with per-step validation, choice-dependent option lists,
//! one-time-code verification and single-flight submission, plus a terminal
//! front-end that drives two concrete forms.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;
