//! # gemini-report
//!
//! **Tier 4 (Report / Community Detection)**
//!
//! Component H: exhaustively enumerates similarity clusters across the
//! whole index (spec §4.H), plus the stable `ReportEnvelope` JSON shape
//! the `report --output json` CLI command emits.
//!
//! ## What belongs here
//! * `DisjointSets` — streaming union-find, path compression + union by
//!   rank
//! * `detect_communities` — the "Grouped" extraction strategy over a full
//!   `scan_all`
//! * `detect_duplicate_groups` — the exact-duplicate pass over `meta`
//! * `ReportEnvelope` and its nested shapes
//!
//! ## What does NOT belong here
//! * Per-file query orchestration (`gemini-core`)
//! * Text/JSON rendering of the envelope (`gemini-format`)

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use gemini_backend_port::BandIndex;
use gemini_errors::GeminiError;
use gemini_types::{MemberRef, Mode, RepoFile};

/// Streaming union-find keyed by an opaque string identity — a content
/// sha1, or `path@sha1` for functions (spec §4.H "Implementation
/// requirement"). Path compression on `find`, union by rank on `union`.
#[derive(Debug, Default)]
pub struct DisjointSets {
    parent: HashMap<String, String>,
    rank: HashMap<String, u32>,
}

impl DisjointSets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&mut self, key: &str) {
        if !self.parent.contains_key(key) {
            self.parent.insert(key.to_string(), key.to_string());
            self.rank.insert(key.to_string(), 0);
        }
    }

    /// Find `key`'s root, compressing the path traversed along the way.
    pub fn find(&mut self, key: &str) -> String {
        self.ensure(key);
        let parent = self.parent[key].clone();
        if parent == key {
            return parent;
        }
        let root = self.find(&parent);
        self.parent.insert(key.to_string(), root.clone());
        root
    }

    /// Union the sets containing `a` and `b`, by rank.
    pub fn union(&mut self, a: &str, b: &str) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let rank_a = self.rank[&root_a];
        let rank_b = self.rank[&root_b];
        if rank_a < rank_b {
            self.parent.insert(root_a, root_b);
        } else if rank_a > rank_b {
            self.parent.insert(root_b, root_a);
        } else {
            self.parent.insert(root_b.clone(), root_a.clone());
            self.rank.insert(root_a, rank_a + 1);
        }
    }

    /// Every key ever seen by `find`/`union` (insertion order not
    /// guaranteed — callers sort as needed).
    #[must_use]
    pub fn members(&self) -> Vec<String> {
        self.parent.keys().cloned().collect()
    }
}

/// A connected-component similarity cluster (spec §4.H output): a sorted,
/// deduplicated list of member identities, never a singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityCommunity {
    pub members: Vec<String>,
}

/// An exact-duplicate cluster: every `RepoFile` sharing one content sha1
/// (spec §4.H "Exact-duplicate reporting").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub sha1: String,
    pub files: Vec<RepoFile>,
}

/// Component H's "Grouped" strategy (spec §4.H): a single ordered
/// `scan_all`, where consecutive rows sharing `(hashtable_id, value)` form
/// a collision bucket contributing a clique edge set. Returns the
/// connected components with size ≥ 2, sorted by `(size desc,
/// lexicographically smallest member asc)`.
pub fn detect_communities<B: BandIndex>(index: &B, mode: Mode) -> Result<Vec<SimilarityCommunity>, GeminiError> {
    let rows = index.scan_all(mode)?;
    let mut dsu = DisjointSets::new();

    let mut bucket: Vec<String> = Vec::new();
    let mut bucket_key: Option<(u32, Vec<u8>)> = None;

    let flush = |bucket: &mut Vec<String>, dsu: &mut DisjointSets| {
        if bucket.len() >= 2 {
            for sha in bucket[1..].iter() {
                dsu.union(&bucket[0], sha);
            }
        } else if let Some(only) = bucket.first() {
            dsu.ensure_seen(only);
        }
        bucket.clear();
    };

    for (hashtable_id, value, sha) in rows {
        let key = (hashtable_id, value);
        match &bucket_key {
            Some(k) if *k == key => bucket.push(sha),
            _ => {
                flush(&mut bucket, &mut dsu);
                bucket_key = Some(key);
                bucket.push(sha);
            }
        }
    }
    flush(&mut bucket, &mut dsu);

    Ok(communities_from(&mut dsu))
}

impl DisjointSets {
    /// Register `key` as a member without unioning it with anything —
    /// used so a size-1 bucket still shows up in `members()`, even though
    /// it will never form a non-singleton community.
    fn ensure_seen(&mut self, key: &str) {
        self.ensure(key);
    }
}

fn communities_from(dsu: &mut DisjointSets) -> Vec<SimilarityCommunity> {
    let mut by_root: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for key in dsu.members() {
        let root = dsu.find(&key);
        by_root.entry(root).or_default().push(key);
    }

    let mut communities: Vec<SimilarityCommunity> = by_root
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|mut members| {
            members.sort();
            members.dedup();
            SimilarityCommunity { members }
        })
        .collect();

    // (size desc, lexicographically smallest member asc) (spec §4.H).
    communities.sort_by(|a, b| {
        b.members
            .len()
            .cmp(&a.members.len())
            .then_with(|| a.members[0].cmp(&b.members[0]))
    });

    communities
}

/// The exact-duplicate pass: group `scan_meta`'s rows by `sha1`, keeping
/// only groups of size ≥ 2 (spec §4.H "a separate pass over `meta` grouped
/// by `sha`"). Must agree with `detect_communities` run against a
/// reserved-hashtable encoding of the same data; this crate only
/// implements the meta-scan path since it needs no extra band bookkeeping
/// from the build side.
pub fn detect_duplicate_groups<B: BandIndex>(index: &B) -> Result<Vec<DuplicateGroup>, GeminiError> {
    let rows = index.scan_meta()?;
    let mut by_sha: BTreeMap<String, Vec<RepoFile>> = BTreeMap::new();
    for file in rows {
        by_sha.entry(file.sha1.clone()).or_default().push(file);
    }

    Ok(by_sha
        .into_iter()
        .filter(|(_, files)| files.len() >= 2)
        .map(|(sha1, files)| DuplicateGroup { sha1, files })
        .collect())
}

/// Resolve one community member's opaque key (a content sha1 in
/// `Mode::File`, or `path@content_sha1` in `Mode::Func`) into the
/// `MemberRef` shape the CLI's JSON contract fixes (spec §6, §9 "the
/// composite is opaque except for formatting"). Returns `None` if the key
/// names a sha1 the `meta` table has no provenance for (a consistency gap
/// between the hashtables and `meta`, not expected in a well-formed index).
pub fn resolve_member<B: BandIndex>(index: &B, mode: Mode, key: &str) -> Result<Option<MemberRef>, GeminiError> {
    match mode {
        Mode::File => {
            let candidates = index.find_by_content_hash(key)?;
            Ok(candidates.first().map(MemberRef::file))
        }
        Mode::Func => {
            let Some((path, sha1)) = key.rsplit_once('@') else {
                return Ok(None);
            };
            let candidates = index.find_by_content_hash(sha1)?;
            let file = candidates
                .iter()
                .find(|f| f.path == path)
                .or_else(|| candidates.first())
                .cloned();
            Ok(file.map(|file| MemberRef::function(file, None, None)))
        }
    }
}

/// Resolve every member of every community, dropping communities that
/// shrink below size 2 once unresolvable members (see `resolve_member`)
/// are dropped.
pub fn resolve_communities<B: BandIndex>(
    index: &B,
    mode: Mode,
    communities: &[SimilarityCommunity],
) -> Result<Vec<Vec<MemberRef>>, GeminiError> {
    let mut out = Vec::with_capacity(communities.len());
    for community in communities {
        let mut members = Vec::with_capacity(community.members.len());
        for key in &community.members {
            if let Some(member) = resolve_member(index, mode, key)? {
                members.push(member);
            }
        }
        if members.len() >= 2 {
            out.push(members);
        }
    }
    Ok(out)
}

/// The stable outer JSON shape `report --output json` emits (SPEC_FULL §3
/// "ReportEnvelope"): a minimal, self-describing wrapper around the
/// component-H output plus the ambient skipped-files footer.
///
/// `similarities` is spec §6's `"similarities": [[MemberRef]]` contract
/// field directly: one entry per community, each a resolved member list.
/// `communities` keeps the pre-resolution, opaque-key form alongside it —
/// cheaper to hold in memory and still useful to callers (e.g.
/// `--cc-output`) that want the raw keys rather than resolved provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub schema: String,
    pub tool: String,
    pub generated_at: String,
    pub mode: Mode,
    pub duplicates: Vec<DuplicateGroup>,
    pub similarities: Vec<Vec<MemberRef>>,
    pub communities: Vec<SimilarityCommunity>,
    pub skipped_files: BTreeMap<String, u64>,
}

/// Schema identifier for the report envelope (SPEC_FULL §3).
pub const REPORT_SCHEMA: &str = "gemini.report.v1";

impl ReportEnvelope {
    #[must_use]
    pub fn new(
        tool: impl Into<String>,
        generated_at: impl Into<String>,
        mode: Mode,
        duplicates: Vec<DuplicateGroup>,
        similarities: Vec<Vec<MemberRef>>,
        communities: Vec<SimilarityCommunity>,
        skipped_files: BTreeMap<String, u64>,
    ) -> Self {
        Self {
            schema: REPORT_SCHEMA.to_string(),
            tool: tool.into(),
            generated_at: generated_at.into(),
            mode,
            duplicates,
            similarities,
            communities,
            skipped_files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_backend_port::MemoryIndex;
    use gemini_types::Band;

    fn band(id: u32, bytes: &[u8]) -> Band {
        Band {
            hashtable_id: id,
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn disjoint_sets_unions_transitively() {
        let mut dsu = DisjointSets::new();
        dsu.union("a", "b");
        dsu.union("b", "c");
        assert_eq!(dsu.find("a"), dsu.find("c"));
    }

    #[test]
    fn disjoint_sets_keeps_unrelated_keys_apart() {
        let mut dsu = DisjointSets::new();
        dsu.union("a", "b");
        dsu.ensure_seen("z");
        assert_ne!(dsu.find("a"), dsu.find("z"));
    }

    #[test]
    fn detect_communities_groups_colliding_bands_and_excludes_singletons() {
        let mut index = MemoryIndex::new();
        index.upsert_bands("sha-a", &[band(0, b"xyz")], Mode::File).unwrap();
        index.upsert_bands("sha-b", &[band(0, b"xyz")], Mode::File).unwrap();
        index.upsert_bands("sha-c", &[band(0, b"xyz")], Mode::File).unwrap();
        index.upsert_bands("sha-lonely", &[band(1, b"only")], Mode::File).unwrap();

        let communities = detect_communities(&index, Mode::File).unwrap();
        assert_eq!(communities.len(), 1);
        assert_eq!(communities[0].members, vec!["sha-a", "sha-b", "sha-c"]);
    }

    #[test]
    fn detect_communities_merges_overlapping_buckets() {
        let mut index = MemoryIndex::new();
        // Two bands, both shared by sha-a and sha-b, plus sha-b and sha-c
        // collide on a second band — all three end up in one community.
        index.upsert_bands("sha-a", &[band(0, b"one")], Mode::File).unwrap();
        index.upsert_bands("sha-b", &[band(0, b"one")], Mode::File).unwrap();
        index.upsert_bands("sha-b", &[band(1, b"two")], Mode::File).unwrap();
        index.upsert_bands("sha-c", &[band(1, b"two")], Mode::File).unwrap();

        let communities = detect_communities(&index, Mode::File).unwrap();
        assert_eq!(communities.len(), 1);
        assert_eq!(communities[0].members, vec!["sha-a", "sha-b", "sha-c"]);
    }

    #[test]
    fn detect_communities_orders_by_size_desc_then_lowest_member() {
        let mut index = MemoryIndex::new();
        index.upsert_bands("z1", &[band(0, b"big")], Mode::File).unwrap();
        index.upsert_bands("z2", &[band(0, b"big")], Mode::File).unwrap();
        index.upsert_bands("z3", &[band(0, b"big")], Mode::File).unwrap();
        index.upsert_bands("a1", &[band(1, b"small")], Mode::File).unwrap();
        index.upsert_bands("a2", &[band(1, b"small")], Mode::File).unwrap();

        let communities = detect_communities(&index, Mode::File).unwrap();
        assert_eq!(communities.len(), 2);
        assert_eq!(communities[0].members.len(), 3);
        assert_eq!(communities[1].members, vec!["a1", "a2"]);
    }

    #[test]
    fn detect_duplicate_groups_groups_by_sha1() {
        let mut index = MemoryIndex::new();
        for (path, sha1) in [("a.rs", "same"), ("b.rs", "same"), ("c.rs", "other")] {
            index
                .put_meta(RepoFile {
                    repo: "r".into(),
                    commit: "c".into(),
                    path: path.into(),
                    sha1: sha1.into(),
                })
                .unwrap();
        }

        let groups = detect_duplicate_groups(&index).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].sha1, "same");
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn report_envelope_round_trips_json() {
        let envelope = ReportEnvelope::new(
            "gemini",
            "2026-01-01T00:00:00Z",
            Mode::File,
            vec![],
            vec![],
            vec![],
            BTreeMap::new(),
        );
        let json = serde_json::to_string(&envelope).unwrap();
        let back: ReportEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.schema, REPORT_SCHEMA);
        assert_eq!(back.mode, Mode::File);
    }

    #[test]
    fn resolve_member_in_file_mode_looks_up_meta_by_sha() {
        let mut index = MemoryIndex::new();
        let file = RepoFile {
            repo: "r".into(),
            commit: "c".into(),
            path: "a.rs".into(),
            sha1: "sha-a".into(),
        };
        index.put_meta(file.clone()).unwrap();

        let resolved = resolve_member(&index, Mode::File, "sha-a").unwrap();
        assert_eq!(resolved, Some(MemberRef::file(&file)));
        assert_eq!(resolve_member(&index, Mode::File, "missing").unwrap(), None);
    }

    #[test]
    fn resolve_member_in_func_mode_splits_path_at_last_at() {
        let mut index = MemoryIndex::new();
        let file = RepoFile {
            repo: "r".into(),
            commit: "c".into(),
            path: "a.rs".into(),
            sha1: "sha-a".into(),
        };
        index.put_meta(file.clone()).unwrap();

        let resolved = resolve_member(&index, Mode::Func, "a.rs@sha-a").unwrap();
        assert_eq!(resolved, Some(MemberRef::function(file, None, None)));
        assert_eq!(resolve_member(&index, Mode::Func, "no-at-sign").unwrap(), None);
    }

    #[test]
    fn resolve_communities_drops_members_meta_has_forgotten() {
        let mut index = MemoryIndex::new();
        index
            .put_meta(RepoFile {
                repo: "r".into(),
                commit: "c".into(),
                path: "a.rs".into(),
                sha1: "sha-a".into(),
            })
            .unwrap();
        // "sha-b" has no meta row, so it cannot resolve and the community
        // shrinks below size 2.
        let communities = vec![SimilarityCommunity {
            members: vec!["sha-a".to_string(), "sha-b".to_string()],
        }];

        let resolved = resolve_communities(&index, Mode::File, &communities).unwrap();
        assert!(resolved.is_empty());
    }
}
