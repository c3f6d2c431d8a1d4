macro_rules! v1_path {
    ($path:literal) => {
        concat!("/api/v1", $path)
    };
}

/// Versioned API route definitions. Paths carry `{param}` placeholders in
/// axum syntax; [`fill`] substitutes them when building links.
pub mod v1 {
    pub const ROOT: &str = "/api/v1";
    pub const VERSION: &str = "v1";

    pub const HEALTH: &str = v1_path!("/health");

    pub mod providers {
        pub const COLLECTION: &str = v1_path!("/providers");
        pub const ITEM: &str = v1_path!("/providers/{id}");

        pub mod checks {
            pub const COLLECTION: &str = v1_path!("/providers/{provider_id}/checks");
            pub const ITEM: &str = v1_path!("/providers/{provider_id}/checks/{id}");
        }
    }

    pub mod scans {
        pub const COLLECTION: &str = v1_path!("/scans");
        pub const ITEM: &str = v1_path!("/scans/{id}");
        pub const STATUS: &str = v1_path!("/scans/{id}/status");

        pub mod findings {
            pub const COLLECTION: &str = v1_path!("/scans/{scan_id}/findings");
            pub const ITEM: &str = v1_path!("/scans/{scan_id}/findings/{id}");
        }
    }
}

/// Strip the version prefix, giving the path relative to the nested router.
pub fn relative(path: &str) -> &str {
    path.strip_prefix(v1::ROOT).unwrap_or(path)
}

/// Replace `{name}` placeholders with the given values.
pub fn fill(template: &str, params: &[(&str, String)]) -> String {
    let mut out = template.to_string();
    for (name, value) in params {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_filled() {
        let path = fill(
            v1::providers::checks::ITEM,
            &[("provider_id", "p1".to_string()), ("id", 42.to_string())],
        );
        assert_eq!(path, "/api/v1/providers/p1/checks/42");
    }

    #[test]
    fn relative_paths_drop_the_version_root() {
        assert_eq!(relative(v1::scans::STATUS), "/scans/{id}/status");
        assert_eq!(relative("/elsewhere"), "/elsewhere");
    }
}
