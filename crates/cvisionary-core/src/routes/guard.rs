use crate::auth::{Role, SessionState};

use super::table::{landing_view, View};

/// Outcome of checking a view against the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Not logged in; send the user to the login view.
    RedirectToLogin,
    /// Logged in with the wrong role; render access-denied in place.
    Deny,
}

/// Decide whether a view requiring `required` may be entered.
///
/// A role mismatch is `Deny`, not a redirect: "not logged in" and "logged
/// in but not allowed" stay distinguishable.
pub fn decide(state: &SessionState, required: Option<Role>) -> Decision {
    match (state, required) {
        (SessionState::Anonymous, Some(_)) => Decision::RedirectToLogin,
        (SessionState::Anonymous, None) => Decision::Allow,
        (SessionState::Authenticated(_), None) => Decision::Allow,
        (SessionState::Authenticated(session), Some(role)) if session.role() == role => Decision::Allow,
        (SessionState::Authenticated(_), Some(_)) => Decision::Deny,
    }
}

/// What to render for a requested view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Render(View),
    /// Show the login view; `after_login` is where the user was headed.
    Login { after_login: View },
    /// Show access-denied in place of `requested`.
    AccessDenied { requested: View },
}

impl Resolution {
    /// The view actually shown
    pub fn view(&self) -> View {
        match self {
            Resolution::Render(view) => *view,
            Resolution::Login { .. } => View::Login,
            Resolution::AccessDenied { .. } => View::AccessDenied,
        }
    }
}

/// Map a requested view to what is shown. A logged-in user asking for the
/// login view lands on their own dashboard instead.
pub fn resolve(state: &SessionState, view: View) -> Resolution {
    if let (View::Login, Some(role)) = (view, state.role()) {
        return Resolution::Render(landing_view(role));
    }
    match decide(state, view.required_role()) {
        Decision::Allow => Resolution::Render(view),
        Decision::RedirectToLogin => Resolution::Login { after_login: view },
        Decision::Deny => Resolution::AccessDenied { requested: view },
    }
}
