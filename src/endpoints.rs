use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

/// One of the judge-data collections exposed by the backend API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Judgings,
    Submissions,
    Contests,
    #[serde(rename = "config")]
    #[value(name = "config")]
    Configuration,
    Teams,
    Problems,
    Categories,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Judgings,
        ResourceKind::Submissions,
        ResourceKind::Contests,
        ResourceKind::Configuration,
        ResourceKind::Teams,
        ResourceKind::Problems,
        ResourceKind::Categories,
    ];

    /// Path of this resource relative to the API base, including fixed query.
    fn relative_path(self) -> &'static str {
        match self {
            ResourceKind::Judgings => "judgings",
            ResourceKind::Submissions => "submissions",
            ResourceKind::Contests => "contests",
            ResourceKind::Configuration => "config",
            ResourceKind::Teams => "teams?public=true",
            ResourceKind::Problems => "problems",
            ResourceKind::Categories => "categories?public=true",
        }
    }

    /// Whether the target carries the active contest id.
    pub fn is_contest_scoped(self) -> bool {
        matches!(
            self,
            ResourceKind::Submissions | ResourceKind::Judgings | ResourceKind::Problems
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Judgings => "judgings",
            ResourceKind::Submissions => "submissions",
            ResourceKind::Contests => "contests",
            ResourceKind::Configuration => "config",
            ResourceKind::Teams => "teams",
            ResourceKind::Problems => "problems",
            ResourceKind::Categories => "categories",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved request targets for every [`ResourceKind`], relative to one API base.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    base: Url,
    targets: HashMap<ResourceKind, Url>,
}

impl EndpointRegistry {
    /// Resolve all seven resource paths against `base`.
    ///
    /// A base without a trailing slash gets one, so `https://judge/api`
    /// resolves `judgings` to `https://judge/api/judgings` rather than
    /// replacing the `api` segment.
    pub fn new(base: &Url) -> Result<Self, url::ParseError> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut targets = HashMap::with_capacity(ResourceKind::ALL.len());
        for kind in ResourceKind::ALL {
            targets.insert(kind, base.join(kind.relative_path())?);
        }

        Ok(Self { base, targets })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Target URL for `kind`.
    pub fn resolve(&self, kind: ResourceKind) -> &Url {
        // Every kind is inserted in `new`; a miss means `ALL` is out of sync.
        &self.targets[&kind]
    }

    /// Set the `cid` query parameter on the contest-scoped targets.
    ///
    /// Any existing `cid` is replaced; other parameters are kept.
    pub fn inject_contest_id(&mut self, id: i64) {
        let cid = id.to_string();
        for kind in ResourceKind::ALL.into_iter().filter(|k| k.is_contest_scoped()) {
            let Some(url) = self.targets.get_mut(&kind) else {
                continue;
            };
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != "cid")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair("cid", &cid);
        }
    }

    /// Archive location of `kind`'s last response, relative to the archive root.
    pub fn archive_path(&self, kind: ResourceKind) -> PathBuf {
        PathBuf::from(self.resolve(kind).path().trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EndpointRegistry {
        EndpointRegistry::new(&Url::parse("https://judge.example.org/api/").unwrap()).unwrap()
    }

    #[test]
    fn resolves_all_kinds_against_base() {
        let reg = registry();
        assert_eq!(
            reg.resolve(ResourceKind::Judgings).as_str(),
            "https://judge.example.org/api/judgings"
        );
        assert_eq!(
            reg.resolve(ResourceKind::Configuration).as_str(),
            "https://judge.example.org/api/config"
        );
        assert_eq!(
            reg.resolve(ResourceKind::Teams).as_str(),
            "https://judge.example.org/api/teams?public=true"
        );
        assert_eq!(
            reg.resolve(ResourceKind::Categories).as_str(),
            "https://judge.example.org/api/categories?public=true"
        );
    }

    #[test]
    fn base_without_trailing_slash_keeps_last_segment() {
        let reg =
            EndpointRegistry::new(&Url::parse("https://judge.example.org/api").unwrap()).unwrap();
        assert_eq!(
            reg.resolve(ResourceKind::Problems).as_str(),
            "https://judge.example.org/api/problems"
        );
    }

    #[test]
    fn inject_touches_only_contest_scoped_targets() {
        let mut reg = registry();
        let before: HashMap<ResourceKind, String> = ResourceKind::ALL
            .into_iter()
            .map(|k| (k, reg.resolve(k).to_string()))
            .collect();

        reg.inject_contest_id(7);

        for kind in ResourceKind::ALL {
            let url = reg.resolve(kind);
            if kind.is_contest_scoped() {
                assert_eq!(url.query(), Some("cid=7"), "{kind}");
            } else {
                assert_eq!(url.as_str(), before[&kind], "{kind}");
            }
        }
    }

    #[test]
    fn inject_is_idempotent_and_replaces() {
        let mut reg = registry();
        reg.inject_contest_id(3);
        reg.inject_contest_id(3);
        assert_eq!(
            reg.resolve(ResourceKind::Submissions).as_str(),
            "https://judge.example.org/api/submissions?cid=3"
        );

        reg.inject_contest_id(-12);
        assert_eq!(reg.resolve(ResourceKind::Judgings).query(), Some("cid=-12"));
    }

    #[test]
    fn inject_preserves_other_query_parameters() {
        let base = Url::parse("https://judge.example.org/api/").unwrap();
        let mut reg = EndpointRegistry::new(&base).unwrap();
        reg.targets
            .insert(ResourceKind::Problems, base.join("problems?lang=en").unwrap());
        reg.inject_contest_id(2);
        assert_eq!(
            reg.resolve(ResourceKind::Problems).query(),
            Some("lang=en&cid=2")
        );
    }

    #[test]
    fn archive_path_strips_leading_slash_and_query() {
        let mut reg = registry();
        reg.inject_contest_id(1);
        assert_eq!(
            reg.archive_path(ResourceKind::Judgings),
            PathBuf::from("api/judgings")
        );
        assert_eq!(reg.archive_path(ResourceKind::Teams), PathBuf::from("api/teams"));
    }
}
