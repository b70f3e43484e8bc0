//! core::statics
//!
//! Fixed names shared by the registry, the topology and the runtime handlers.

/// Project name; prefixes stack names, pipeline names and parameter paths.
pub const PROJECT_NAME: &str = "component-library";

/// Source repository the pipeline builds from.
pub const REPOSITORY: &str = "component-library-infra";
pub const REPOSITORY_OWNER: &str = "GemeenteNijmegen";

/// Branch built when no branch signal is present.
pub const DEFAULT_BRANCH: &str = "acceptance";

/// Environment variable carrying the branch signal.
pub const BRANCH_ENV_VAR: &str = "BRANCH_NAME";

/// Branch whose site is considered production for cache invalidation.
pub const PRODUCTION_BRANCH: &str = "main";

/// Region holding CloudFront certificates and DNSSEC key-signing keys.
pub const CERTIFICATE_REGION: &str = "us-east-1";

/// Object keys whose creation triggers a cache invalidation.
pub const CACHE_TRIGGER_KEYS: &[&str] = &["index.html"];

/// Permissions boundary attached to stacks in accounts on the old landing zone.
pub const LEGACY_PERMISSIONS_BOUNDARY: &str = "landingzone-workload-permissions-boundary";

/// `<owner>/<repository>` as used by the pipeline source.
pub fn repository_slug() -> String {
    format!("{REPOSITORY_OWNER}/{REPOSITORY}")
}
