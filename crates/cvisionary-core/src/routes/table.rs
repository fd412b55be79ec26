use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::auth::{Role, SessionState};

/// Named views of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    Student,
    Recruiter,
    ScoringTransparency,
    Login,
    Signup,
    AccessDenied,
}

impl View {
    pub const ALL: [View; 7] = [
        View::Home,
        View::Student,
        View::Recruiter,
        View::ScoringTransparency,
        View::Login,
        View::Signup,
        View::AccessDenied,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            View::Home => "/",
            View::Student => "/student",
            View::Recruiter => "/recruiter",
            View::ScoringTransparency => "/scoring-transparency",
            View::Login => "/login",
            View::Signup => "/signup",
            View::AccessDenied => "/access-denied",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            View::Home => "Home",
            View::Student => "Student",
            View::Recruiter => "Recruiter",
            View::ScoringTransparency => "How Scoring Works",
            View::Login => "Login",
            View::Signup => "Sign up",
            View::AccessDenied => "Access Denied",
        }
    }

    /// Role a session must hold to enter; `None` for public views.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            View::Student => Some(Role::Student),
            View::Recruiter => Some(Role::Recruiter),
            _ => None,
        }
    }

    /// Accepts a path (`/student`, `student/`) or a bare name.
    pub fn from_path(input: &str) -> Option<View> {
        let trimmed = input.trim();
        let normalized = trimmed.trim_matches('/').to_lowercase();
        if normalized.is_empty() {
            return if trimmed.is_empty() { None } else { Some(View::Home) };
        }
        View::ALL
            .into_iter()
            .find(|view| view.path().trim_start_matches('/') == normalized)
            .or_else(|| match normalized.as_str() {
                "home" => Some(View::Home),
                "scoring" => Some(View::ScoringTransparency),
                _ => None,
            })
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown view '{0}'")]
pub struct UnknownView(pub String);

impl FromStr for View {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        View::from_path(s).ok_or_else(|| UnknownView(s.to_string()))
    }
}

/// Where a user lands after logging in with `role`.
pub fn landing_view(role: Role) -> View {
    match role {
        Role::Student => View::Student,
        Role::Recruiter => View::Recruiter,
    }
}

/// Navigation links to show for the current session.
pub fn nav_links(state: &SessionState) -> Vec<View> {
    let mut links = vec![View::Home];
    if let Some(role) = state.role() {
        links.push(landing_view(role));
    }
    links.push(View::ScoringTransparency);
    if !state.is_authenticated() {
        links.push(View::Login);
        links.push(View::Signup);
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::encode_unsigned;
    use crate::auth::Session;
    use serde_json::json;

    #[test]
    fn test_from_path() {
        assert_eq!(View::from_path("/"), Some(View::Home));
        assert_eq!(View::from_path("/student"), Some(View::Student));
        assert_eq!(View::from_path("recruiter/"), Some(View::Recruiter));
        assert_eq!(View::from_path("/Scoring-Transparency"), Some(View::ScoringTransparency));
        assert_eq!(View::from_path("home"), Some(View::Home));
        assert_eq!(View::from_path("/admin"), None);
        assert_eq!(View::from_path(""), None);
    }

    #[test]
    fn test_path_round_trip() {
        for view in View::ALL {
            assert_eq!(view.path().parse::<View>(), Ok(view));
        }
    }

    #[test]
    fn test_required_roles() {
        assert_eq!(View::Student.required_role(), Some(Role::Student));
        assert_eq!(View::Recruiter.required_role(), Some(Role::Recruiter));
        assert_eq!(View::Home.required_role(), None);
        assert_eq!(View::AccessDenied.required_role(), None);
    }

    #[test]
    fn test_nav_links() {
        assert_eq!(
            nav_links(&SessionState::Anonymous),
            vec![View::Home, View::ScoringTransparency, View::Login, View::Signup]
        );

        let token = encode_unsigned(&json!({"sub": "hr@corp.io", "role": "recruiter"}));
        let state = SessionState::Authenticated(Session::from_token(token).unwrap());
        assert_eq!(
            nav_links(&state),
            vec![View::Home, View::Recruiter, View::ScoringTransparency]
        );
    }
}
