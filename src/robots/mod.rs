//! Robots.txt handling module
//!
//! The coordinator consults a [`RobotsChecker`] before dispatching a URL when the
//! job has `respect-robots` enabled. Nothing here fetches robots.txt over the
//! network: callers either use [`AllowAll`] or supply rules they already have.

mod rules;

pub use rules::RobotsTxtRules;

use url::Url;

/// Decides whether a URL may be fetched
pub trait RobotsChecker: Send + Sync {
    fn is_allowed(&self, url: &Url) -> bool;
}

/// Permits every URL
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl RobotsChecker for AllowAll {
    fn is_allowed(&self, _url: &Url) -> bool {
        true
    }
}
