//! Recognizing import paths that can be fetched from a remote host.

use std::sync::LazyLock;

use regex::Regex;

static FETCHABLE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^code\.google\.com/p/([a-z0-9\-]+(\.[a-z0-9\-]+)?)(/[a-z0-9A-Z_.\-/]+)?$",
        r"^(github\.com/[a-z0-9A-Z_.\-]+/[a-z0-9A-Z_.\-]+)(/[a-z0-9A-Z_.\-/]*)?$",
        r"^(bitbucket\.org/[a-z0-9A-Z_.\-]+/[a-z0-9A-Z_.\-]+)(/[a-z0-9A-Z_.\-/]*)?$",
        r"^(launchpad\.net/([a-z0-9A-Z_.\-]+(/[a-z0-9A-Z_.\-]+)?|~[a-z0-9A-Z_.\-]+/(\+junk|[a-z0-9A-Z_.\-]+)/[a-z0-9A-Z_.\-]+))(/[a-z0-9A-Z_.\-/]+)?$",
        r"^[a-z0-9A-Z_.\-/]+\.(git|hg|bzr|svn)(/[a-z0-9A-Z_.\-/]*)?$",
    ]
    .iter()
    .map(|re| Regex::new(re).expect("valid regex"))
    .collect()
});

/// Old project-hosting paths that are no longer fetched.
static RETIRED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9\-]+\.googlecode\.com/(svn|hg))(/[a-z0-9A-Z_.\-/]*)?$")
        .expect("valid regex")
});

/// Whether `name` has the shape of a fetchable remote package.
pub fn is_fetchable(name: &str) -> bool {
    FETCHABLE.iter().any(|re| re.is_match(name))
}

/// Whether `name` uses a retired hosting format.
pub fn is_retired(name: &str) -> bool {
    RETIRED.is_match(name)
}
