//! # gemini-format
//!
//! **Tier 5 (Rendering)**
//!
//! Text and JSON renderers for query results (spec §4.G) and index
//! reports (spec §4.H), selected by the CLI's `--output text|json` flag
//! and, for reports, the `--format condensed|use-group-by|""` flag (spec
//! §6 "CLI surface").
//!
//! ## What belongs here
//! * `render_query_text` / `render_query_json`
//! * `render_report_text` / `render_report_json`
//! * The `duplicates` shape switch (`Grouped`/`ExpandedGroup`/`Empty`,
//!   spec §6 "JSON report shape")
//!
//! ## What does NOT belong here
//! * Backend I/O or sha resolution (`gemini-report`, `gemini-core`) —
//!   everything rendered here has already been looked up by the caller

use gemini_report::{DuplicateGroup, ReportEnvelope};
use gemini_types::{MemberRef, Mode, RepoFile};
use serde_json::{json, Value};

/// `--output` (spec §6): plain human-readable lines, or the fixed JSON
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// `--format`, report-only (spec §6). Controls how `duplicates` is shaped
/// in the JSON contract; has no effect on `--output text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// `--format ""` (the default): duplicate detail is left out of the
    /// JSON body entirely. `similarities` already covers the
    /// near-duplicate story; full duplicate listings are opt-in.
    #[default]
    Plain,
    /// `--format condensed`: one array per duplicate group.
    Condensed,
    /// `--format use-group-by`: one flat array of `{group, member}` rows.
    UseGroupBy,
}

fn member_ref_value(member: &MemberRef) -> Value {
    serde_json::to_value(member).expect("MemberRef has no non-serializable fields")
}

/// A `DuplicateGroup`'s files, resolved to `MemberRef`s. `meta` is
/// file-granular even in `Mode::Func` (spec §4.F), so function-mode
/// duplicate members carry no `name`/`line` — the exact-duplicate pass
/// never descends into functions.
fn duplicate_members(mode: Mode, group: &DuplicateGroup) -> Vec<MemberRef> {
    group
        .files
        .iter()
        .map(|file| match mode {
            Mode::File => MemberRef::file(file),
            Mode::Func => MemberRef::function(file.clone(), None, None),
        })
        .collect()
}

/// Shape `groups` into the `duplicates` JSON value per `format` (spec §6
/// `Grouped|ExpandedGroup|Empty`).
#[must_use]
pub fn duplicates_json(mode: Mode, format: ReportFormat, groups: &[DuplicateGroup]) -> Value {
    match format {
        ReportFormat::Plain => Value::Array(Vec::new()),
        ReportFormat::Condensed => Value::Array(
            groups
                .iter()
                .map(|group| Value::Array(duplicate_members(mode, group).iter().map(member_ref_value).collect()))
                .collect(),
        ),
        ReportFormat::UseGroupBy => {
            let mut rows = Vec::new();
            for (index, group) in groups.iter().enumerate() {
                for member in duplicate_members(mode, group) {
                    rows.push(json!({"group": index, "member": member_ref_value(&member)}));
                }
            }
            Value::Array(rows)
        }
    }
}

/// `similarities`: one array per community, each a resolved member list
/// (spec §6 `"similarities": [[MemberRef]]`).
#[must_use]
pub fn similarities_json(similarities: &[Vec<MemberRef>]) -> Value {
    Value::Array(
        similarities
            .iter()
            .map(|community| Value::Array(community.iter().map(member_ref_value).collect()))
            .collect(),
    )
}

/// Render a `ReportEnvelope` as the fixed JSON contract (spec §6).
#[must_use]
pub fn render_report_json(envelope: &ReportEnvelope, format: ReportFormat) -> String {
    let value = json!({
        "schema": envelope.schema,
        "tool": envelope.tool,
        "generated_at": envelope.generated_at,
        "mode": envelope.mode.as_str(),
        "duplicates": duplicates_json(envelope.mode, format, &envelope.duplicates),
        "similarities": similarities_json(&envelope.similarities),
        "skipped_files": envelope.skipped_files,
    });
    serde_json::to_string_pretty(&value).expect("report envelope has no non-serializable fields")
}

/// Render a `ReportEnvelope` as human-readable text (spec §7 "the counter
/// is emitted in the final report footer").
#[must_use]
pub fn render_report_text(envelope: &ReportEnvelope) -> String {
    let mut out = String::new();
    out.push_str(&format!("gemini report ({} mode)\n", envelope.mode));

    if envelope.duplicates.is_empty() {
        out.push_str("exact duplicates: none\n");
    } else {
        out.push_str(&format!("exact duplicates: {} group(s)\n", envelope.duplicates.len()));
        for group in &envelope.duplicates {
            out.push_str(&format!("  {} ({} files)\n", group.sha1, group.files.len()));
            for file in &group.files {
                out.push_str(&format!("    {}@{}\n", file.repo, file.path));
            }
        }
    }

    if envelope.communities.is_empty() {
        out.push_str("similarity communities: none\n");
    } else {
        out.push_str(&format!("similarity communities: {}\n", envelope.communities.len()));
        for community in &envelope.communities {
            out.push_str(&format!("  [{}] {}\n", community.members.len(), community.members.join(", ")));
        }
    }

    if envelope.skipped_files.is_empty() {
        out.push_str("skipped files: none\n");
    } else {
        out.push_str("skipped files:\n");
        for (class, count) in &envelope.skipped_files {
            out.push_str(&format!("  {class}: {count}\n"));
        }
    }

    out
}

fn repo_files_to_members(mode: Mode, files: &[RepoFile]) -> Vec<MemberRef> {
    files
        .iter()
        .map(|file| match mode {
            Mode::File => MemberRef::file(file),
            Mode::Func => MemberRef::function(file.clone(), None, None),
        })
        .collect()
}

/// Render a query's duplicate/similar `RepoFile` lists as JSON.
#[must_use]
pub fn render_query_json(mode: Mode, duplicates: &[RepoFile], similar: &[RepoFile]) -> String {
    let value = json!({
        "duplicates": repo_files_to_members(mode, duplicates).iter().map(member_ref_value).collect::<Vec<_>>(),
        "similar": repo_files_to_members(mode, similar).iter().map(member_ref_value).collect::<Vec<_>>(),
    });
    serde_json::to_string_pretty(&value).expect("query result has no non-serializable fields")
}

/// Render a query's duplicate/similar `RepoFile` lists as text.
#[must_use]
pub fn render_query_text(duplicates: &[RepoFile], similar: &[RepoFile]) -> String {
    let mut out = String::new();
    if duplicates.is_empty() {
        out.push_str("exact duplicates: none\n");
    } else {
        out.push_str("exact duplicates:\n");
        for file in duplicates {
            out.push_str(&format!("  {}@{}\n", file.repo, file.path));
        }
    }
    if similar.is_empty() {
        out.push_str("similar files: none\n");
    } else {
        out.push_str("similar files:\n");
        for file in similar {
            out.push_str(&format!("  {}@{}\n", file.repo, file.path));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn file(path: &str, sha1: &str) -> RepoFile {
        RepoFile {
            repo: "r".into(),
            commit: "c".into(),
            path: path.into(),
            sha1: sha1.into(),
        }
    }

    fn sample_group() -> DuplicateGroup {
        DuplicateGroup {
            sha1: "same".into(),
            files: vec![file("a.rs", "same"), file("b.rs", "same")],
        }
    }

    #[test]
    fn duplicates_json_empty_for_plain_format() {
        let value = duplicates_json(Mode::File, ReportFormat::Plain, &[sample_group()]);
        assert_eq!(value, json!([]));
    }

    #[test]
    fn duplicates_json_condensed_nests_one_array_per_group() {
        let value = duplicates_json(Mode::File, ReportFormat::Condensed, &[sample_group()]);
        let groups = value.as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].as_array().unwrap().len(), 2);
    }

    #[test]
    fn duplicates_json_use_group_by_flattens_with_group_index() {
        let value = duplicates_json(Mode::File, ReportFormat::UseGroupBy, &[sample_group()]);
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["group"], 0);
        assert_eq!(rows[1]["group"], 0);
    }

    #[test]
    fn similarities_json_is_nested_member_arrays() {
        let community = vec![MemberRef::file(&file("a.rs", "sha")), MemberRef::file(&file("b.rs", "sha"))];
        let value = similarities_json(&[community]);
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0].as_array().unwrap().len(), 2);
    }

    #[test]
    fn render_report_json_round_trips_through_serde_value() {
        let envelope = ReportEnvelope::new(
            "gemini",
            "2026-01-01T00:00:00Z",
            Mode::File,
            vec![sample_group()],
            vec![vec![MemberRef::file(&file("a.rs", "sha-x"))]],
            vec![],
            BTreeMap::new(),
        );
        let rendered = render_report_json(&envelope, ReportFormat::Condensed);
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["schema"], "gemini.report.v1");
        assert_eq!(value["duplicates"].as_array().unwrap().len(), 1);
        assert_eq!(value["similarities"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn render_report_text_mentions_empty_sections() {
        let envelope = ReportEnvelope::new("gemini", "2026-01-01T00:00:00Z", Mode::File, vec![], vec![], vec![], BTreeMap::new());
        let text = render_report_text(&envelope);
        assert!(text.contains("exact duplicates: none"));
        assert!(text.contains("similarity communities: none"));
        assert!(text.contains("skipped files: none"));
    }

    #[test]
    fn render_query_json_covers_both_lists() {
        let rendered = render_query_json(Mode::File, &[file("a.rs", "sha")], &[]);
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["duplicates"].as_array().unwrap().len(), 1);
        assert!(value["similar"].as_array().unwrap().is_empty());
    }

    #[test]
    fn render_query_text_lists_paths() {
        let text = render_query_text(&[file("a.rs", "sha")], &[file("b.rs", "sha2")]);
        assert!(text.contains("a.rs"));
        assert!(text.contains("b.rs"));
    }
}
