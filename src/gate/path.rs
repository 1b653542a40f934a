#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Public,
    Admin,
    SuperAdmin,
    Cron,
    SiteAccess,
    Asset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteClass {
    pub api: bool,
    pub area: Area,
}

impl RouteClass {
    pub fn requires_identity(&self) -> bool {
        matches!(self.area, Area::Admin | Area::SuperAdmin)
    }

    /// Whether the site password gate applies to this path.
    pub fn site_gated(&self) -> bool {
        !matches!(self.area, Area::SiteAccess | Area::Cron | Area::Asset)
    }
}

const ASSET_PREFIXES: &[&str] = &["/assets", "/static"];
const ASSET_FILES: &[&str] = &["/favicon.ico", "/robots.txt"];

/// `path` equals `prefix` or continues it with a new segment.
pub fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub fn classify(path: &str) -> RouteClass {
    let api = has_segment_prefix(path, "/api");

    let area = if ASSET_FILES.contains(&path)
        || ASSET_PREFIXES
            .iter()
            .any(|prefix| has_segment_prefix(path, prefix))
    {
        Area::Asset
    } else if has_segment_prefix(path, "/site-access") {
        Area::SiteAccess
    } else if has_segment_prefix(path, "/api/cron") {
        Area::Cron
    } else if has_segment_prefix(path, "/super-admin")
        || has_segment_prefix(path, "/api/super-admin")
    {
        Area::SuperAdmin
    } else if has_segment_prefix(path, "/admin") || has_segment_prefix(path, "/api/admin") {
        Area::Admin
    } else {
        Area::Public
    };

    RouteClass { api, area }
}
