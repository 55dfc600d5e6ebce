//! Paginated search results and role-based result sanitisation.

use serde::Serialize;

use crate::models::filters::Pagination;
use crate::models::taxonomy::{Role, Status};
use crate::models::user::User;

/// An entity subject to review-status visibility rules.
pub trait Moderated {
    fn status(&self) -> Status;
    fn created_by(&self) -> Option<&str>;
    /// Strips personal information for unauthenticated viewers.
    fn anonymise(&mut self);
}

/// A page of search results with pagination metadata.
///
/// `total_count` is the window count of rows matching the database filters.
/// It is intentionally computed before `sanitise` runs, so a restricted
/// viewer may receive fewer rows than the count suggests.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub per_page: i64,
    pub current_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn from_search(data: Vec<T>, total_count: i64, pagination: &Pagination) -> Self {
        let total_pages = if total_count == 0 {
            0
        } else {
            (total_count + pagination.per_page - 1) / pagination.per_page
        };
        Page {
            per_page: pagination.per_page,
            current_page: pagination.page,
            total_pages,
            total_count,
            data,
        }
    }
}

impl<T: Moderated> Page<T> {
    /// Removes items the viewer has no permission to see.
    ///
    /// Admins see everything; curators see everything except other users'
    /// drafts; users see approved items plus their own; visitors see only
    /// approved items, anonymised.
    pub fn sanitise(mut self, user: &User) -> Self {
        match user.role {
            Role::Admin => {}
            Role::Curator => {
                self.data.retain(|entity| {
                    !(entity.status() == Status::Draft
                        && entity.created_by() != Some(user.email.as_str()))
                });
            }
            Role::User => {
                self.data.retain(|entity| {
                    entity.status() == Status::Approved
                        || entity.created_by() == Some(user.email.as_str())
                });
            }
            Role::Visitor => {
                self.data.retain(|entity| entity.status() == Status::Approved);
                for entity in &mut self.data {
                    entity.anonymise();
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::signal::Signal;
    use crate::models::taxonomy::Role;
    use crate::policy::EMAIL_MASK;
    use chrono::Utc;

    fn signal(status: Status, created_by: &str) -> Signal {
        Signal {
            id: 0,
            created_at: Utc::now(),
            status,
            created_by: Some(created_by.to_string()),
            created_for: None,
            modified_at: Utc::now(),
            modified_by: Some(created_by.to_string()),
            headline: None,
            description: None,
            attachment: None,
            steep_primary: None,
            steep_secondary: None,
            signature_primary: None,
            signature_secondary: None,
            sdgs: None,
            created_unit: None,
            url: None,
            relevance: None,
            keywords: None,
            location: None,
            score: None,
            connected_trends: None,
            favorite: false,
        }
    }

    fn viewer(role: Role, email: &str) -> User {
        User {
            role,
            ..User::visitor(email)
        }
    }

    fn mixed_page() -> Page<Signal> {
        let data = vec![
            signal(Status::Approved, "a@undp.org"),
            signal(Status::Draft, "a@undp.org"),
            signal(Status::Draft, "b@undp.org"),
            signal(Status::New, "b@undp.org"),
            signal(Status::Archived, "c@undp.org"),
        ];
        Page::from_search(data, 50, &Pagination::default())
    }

    #[test]
    fn admin_sees_everything() {
        let page = mixed_page().sanitise(&viewer(Role::Admin, "x@undp.org"));
        assert_eq!(page.data.len(), 5);
    }

    #[test]
    fn curator_loses_other_users_drafts() {
        let page = mixed_page().sanitise(&viewer(Role::Curator, "a@undp.org"));
        let statuses: Vec<_> = page.data.iter().map(|s| s.status).collect();
        assert_eq!(page.data.len(), 4);
        assert!(statuses.contains(&Status::Draft)); // own draft kept
        assert!(!page
            .data
            .iter()
            .any(|s| s.status == Status::Draft && s.created_by.as_deref() == Some("b@undp.org")));
    }

    #[test]
    fn user_sees_approved_plus_own() {
        let page = mixed_page().sanitise(&viewer(Role::User, "b@undp.org"));
        assert_eq!(page.data.len(), 3);
        for s in &page.data {
            assert!(
                s.status == Status::Approved || s.created_by.as_deref() == Some("b@undp.org")
            );
        }
    }

    #[test]
    fn visitor_sees_only_anonymised_approved() {
        let page = mixed_page().sanitise(&viewer(Role::Visitor, "anon@undp.org"));
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].status, Status::Approved);
        assert_eq!(page.data[0].created_by.as_deref(), Some(EMAIL_MASK));
        assert_eq!(page.data[0].modified_by.as_deref(), Some(EMAIL_MASK));
    }

    #[test]
    fn total_count_stays_pre_filter() {
        let page = mixed_page().sanitise(&viewer(Role::Visitor, "anon@undp.org"));
        assert_eq!(page.total_count, 50);
        assert_eq!(page.total_pages, 5);
    }

    #[test]
    fn total_pages_rounds_up() {
        let pagination = Pagination {
            per_page: 10,
            ..Pagination::default()
        };
        let page: Page<Signal> = Page::from_search(vec![], 95, &pagination);
        assert_eq!(page.total_pages, 10);

        let page: Page<Signal> = Page::from_search(vec![], 100, &pagination);
        assert_eq!(page.total_pages, 10);

        let page: Page<Signal> = Page::from_search(vec![], 0, &pagination);
        assert_eq!(page.total_pages, 0);
    }
}
