//! Role-gated access to the application's views.
//!
//! - `View`: the named views and the role each one requires
//! - `decide`: pure access decision for a session state and required role
//! - `resolve`: turns a decision into the view to render

pub mod guard;
pub mod table;

pub use guard::{decide, resolve, Decision, Resolution};
pub use table::{landing_view, nav_links, UnknownView, View};
