use crate::auth::session::Permissions;

/// Static navigation catalog. An entry is visible when the user holds any of
/// its permission codes; an empty set means visible to every signed-in user.
struct NavSpec {
    label: &'static str,
    url: &'static str,
    any_of: &'static [&'static str],
}

const NAV: &[NavSpec] = &[
    NavSpec { label: "Dashboard", url: "/dashboard", any_of: &[] },
    NavSpec { label: "My Record", url: "/record", any_of: &["records.view.own"] },
    NavSpec { label: "Records", url: "/records", any_of: &["records.list"] },
    NavSpec { label: "Reviews", url: "/reviews", any_of: &["documents.review", "documents.review.language"] },
    NavSpec { label: "Users", url: "/users", any_of: &["users.list"] },
    NavSpec { label: "Audit", url: "/audit", any_of: &["audit.list"] },
    NavSpec { label: "Account", url: "/account", any_of: &["account.edit"] },
];

pub struct NavItem {
    pub label: String,
    pub url: String,
    pub is_active: bool,
}

/// Build the navigation for the current user and path. Only the entry with
/// the longest URL prefix match is marked active.
pub fn build_nav(permissions: &Permissions, current_path: &str) -> Vec<NavItem> {
    let visible: Vec<&NavSpec> = NAV
        .iter()
        .filter(|spec| spec.any_of.is_empty() || spec.any_of.iter().any(|p| permissions.has(p)))
        .collect();

    let best_match_len = visible
        .iter()
        .filter(|spec| current_path.starts_with(spec.url))
        .map(|spec| spec.url.len())
        .max()
        .unwrap_or(0);

    visible
        .into_iter()
        .map(|spec| {
            let is_active =
                spec.url.len() == best_match_len && current_path.starts_with(spec.url);
            NavItem {
                label: spec.label.to_string(),
                url: spec.url.to_string(),
                is_active,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nav_filters_by_permission() {
        let student = Permissions::from_csv("records.view.own,documents.upload,account.edit");
        let items = build_nav(&student, "/dashboard");
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Dashboard", "My Record", "Account"]);
    }

    #[test]
    fn longest_prefix_wins() {
        let admin = Permissions::from_csv("records.list,records.view.own");
        let items = build_nav(&admin, "/records/12");
        let active: Vec<&str> = items
            .iter()
            .filter(|i| i.is_active)
            .map(|i| i.label.as_str())
            .collect();
        // "/record" is also a prefix of "/records/12" but the longer match wins
        assert_eq!(active, vec!["Records"]);
    }

    #[test]
    fn reviews_visible_to_either_reviewer_class() {
        let language = Permissions::from_csv("documents.review.language");
        let items = build_nav(&language, "/reviews");
        assert!(items.iter().any(|i| i.label == "Reviews" && i.is_active));
    }
}
