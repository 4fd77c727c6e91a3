use std::collections::HashMap;

/// Latest known release of a published action.
#[derive(Debug, Clone)]
pub struct KnownAction {
    pub latest_tag: &'static str,
    pub sha: &'static str,
}

/// Actions with a published supply-chain advisory. Referencing one of these
/// is flagged at error severity regardless of pinning.
pub const COMPROMISED_ACTIONS: &[(&str, &str)] = &[
    (
        "tj-actions/changed-files",
        "previously compromised (CVE-2023-51664); pin to a verified SHA",
    ),
    (
        "reviewdog/action-setup",
        "previously targeted in a supply chain attack; verify the SHA",
    ),
];

/// Static lookup from `owner/repo` to its latest release tag and resolved
/// commit SHA, used only to enrich SHA-pinning suggestions.
///
/// This is host-supplied data; a missing entry degrades the suggestion to
/// generic text and never suppresses the finding.
#[derive(Debug, Clone, Default)]
pub struct KnownActionsDb {
    entries: HashMap<&'static str, KnownAction>,
}

impl KnownActionsDb {
    /// A database with no entries; every lookup degrades gracefully.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The bundled table of common first-party and popular actions.
    pub fn bundled() -> Self {
        let mut entries = HashMap::new();
        for (slug, latest_tag, sha) in BUNDLED {
            entries.insert(
                *slug,
                KnownAction {
                    latest_tag,
                    sha,
                },
            );
        }
        Self { entries }
    }

    pub fn lookup(&self, slug: &str) -> Option<&KnownAction> {
        self.entries.get(slug)
    }

    pub fn advisory(&self, slug: &str) -> Option<&'static str> {
        COMPROMISED_ACTIONS
            .iter()
            .find(|(risky, _)| *risky == slug)
            .map(|(_, note)| *note)
    }
}

const BUNDLED: &[(&str, &str, &str)] = &[
    (
        "actions/checkout",
        "v4.2.2",
        "11bd71901bbe5b1630ceea73d27597364c9af683",
    ),
    (
        "actions/setup-node",
        "v4.1.0",
        "39370e3970a6d050c480ffad4ff0ed4d3fdee5af",
    ),
    (
        "actions/setup-python",
        "v5.3.0",
        "0b93645e9fea7318ecaed2b359559ac225c90a2b",
    ),
    (
        "actions/setup-go",
        "v5.1.0",
        "41dfa10bad2bb2ae585af6ee5bb4d7d973ad74ed",
    ),
    (
        "actions/setup-java",
        "v4.5.0",
        "8df1039502a15bceb9433410b1a100fbe190c53b",
    ),
    (
        "actions/cache",
        "v4.1.2",
        "6849a6489940f00c2f30c0fb92c6274307ccb58a",
    ),
    (
        "actions/upload-artifact",
        "v4.4.3",
        "b4b15b8c7c6ac21ea08fcf65892d2ee8f75cf882",
    ),
    (
        "actions/download-artifact",
        "v4.1.8",
        "fa0a91b85d4f404e444e00e005971372dc801d16",
    ),
    (
        "docker/build-push-action",
        "v6.9.0",
        "4f58ea79222b3b9dc2c8bbdd6debcef730109a75",
    ),
    (
        "docker/login-action",
        "v3.3.0",
        "9780b0c442fbb1117ed29e0efdff1e18412f7567",
    ),
    (
        "github/codeql-action",
        "v3.27.0",
        "662472033e021d55d94146f66f6058822b0b39fd",
    ),
];
