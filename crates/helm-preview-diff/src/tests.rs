use crate::{diff_pair, DiffLimits};
use helm_preview_core::{
    EntryChange, KindTable, Origin, ResourceChange, ResourceDocument,
};
use helm_preview_manifest::parse_single;
use helm_preview_normalize::normalize;
use indoc::indoc;
use similar_asserts::assert_eq as sim_assert_eq;

fn doc(yaml: &str, origin: Origin) -> ResourceDocument {
    let raw = parse_single(yaml, origin, "default")
        .expect("parse")
        .expect("resource");
    normalize(raw.identity, origin, raw.body, &KindTable::builtin(), &[]).expect("normalize")
}

fn diff(live: &str, proposed: &str) -> helm_preview_core::ResourceDiff {
    let live = doc(live, Origin::Live);
    let proposed = doc(proposed, Origin::Proposed);
    let rules = KindTable::builtin().rules_for(&live.identity.kind);
    diff_pair(
        &live.identity.clone(),
        Some(&live),
        Some(&proposed),
        &rules,
        &DiffLimits::default(),
    )
    .expect("one side present")
}

const DEPLOY_3: &str = indoc! {"
    apiVersion: apps/v1
    kind: Deployment
    metadata:
      name: web
    spec:
      replicas: 3
"};

const DEPLOY_1: &str = indoc! {"
    apiVersion: apps/v1
    kind: Deployment
    metadata:
      name: web
    spec:
      replicas: 1
"};

#[test]
fn self_diff_is_unchanged() {
    let d = diff(DEPLOY_3, DEPLOY_3);
    assert_eq!(d.change, ResourceChange::Unchanged);
    assert!(d.entries.is_empty());
    assert!(!d.truncated);
}

#[test]
fn replica_change_entry() {
    // Scenario A shape: replicas 3 -> 1.
    let d = diff(DEPLOY_3, DEPLOY_1);
    assert_eq!(d.change, ResourceChange::Modified);
    assert_eq!(d.entries.len(), 1);
    let e = &d.entries[0];
    assert_eq!(e.path.to_string(), "spec.replicas");
    assert_eq!(e.change, EntryChange::Modified);
    assert_eq!(e.old_value, Some(3.into()));
    assert_eq!(e.new_value, Some(1.into()));
}

#[test]
fn server_noise_only_is_unchanged() {
    // Scenario D: only a server-assigned resourceVersion differs.
    let live = indoc! {r#"
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: web
          resourceVersion: "123"
        spec:
          replicas: 3
    "#};
    let d = diff(live, DEPLOY_3);
    assert_eq!(d.change, ResourceChange::Unchanged);
}

#[test]
fn immutable_change_requires_replace() {
    // Scenario C: PVC storage class change.
    let live = indoc! {"
        apiVersion: v1
        kind: PersistentVolumeClaim
        metadata:
          name: data
        spec:
          storageClassName: standard
    "};
    let proposed = indoc! {"
        apiVersion: v1
        kind: PersistentVolumeClaim
        metadata:
          name: data
        spec:
          storageClassName: fast-ssd
    "};
    let d = diff(live, proposed);
    assert_eq!(d.entries.len(), 1);
    assert_eq!(d.entries[0].change, EntryChange::RequiresReplace);
    assert_eq!(d.entries[0].path.to_string(), "spec.storageClassName");
}

#[test]
fn type_change_is_reported() {
    let live = indoc! {"
        apiVersion: v1
        kind: ConfigMap
        metadata:
          name: cm
        data:
          threshold: ten
    "};
    let proposed = indoc! {"
        apiVersion: v1
        kind: ConfigMap
        metadata:
          name: cm
        data:
          threshold: [10]
    "};
    let d = diff(live, proposed);
    assert_eq!(d.entries.len(), 1);
    assert_eq!(d.entries[0].change, EntryChange::TypeChanged);
}

#[test]
fn unordered_env_matches_by_name() {
    let live = indoc! {"
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: web
        spec:
          template:
            spec:
              containers:
                - name: app
                  env:
                    - name: LOG_LEVEL
                      value: info
                    - name: REGION
                      value: eu
    "};
    let proposed = indoc! {"
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: web
        spec:
          template:
            spec:
              containers:
                - name: app
                  env:
                    - name: REGION
                      value: us
                    - name: EXTRA
                      value: '1'
    "};
    let d = diff(live, proposed);
    let paths: Vec<String> = d.entries.iter().map(|e| e.path.to_string()).collect();
    assert_eq!(
        paths,
        vec![
            "spec.template.spec.containers[0].env[name=EXTRA]",
            "spec.template.spec.containers[0].env[name=LOG_LEVEL]",
            "spec.template.spec.containers[0].env[name=REGION].value",
        ]
    );
    assert_eq!(d.entries[0].change, EntryChange::Added);
    assert_eq!(d.entries[1].change, EntryChange::Removed);
    assert_eq!(d.entries[2].change, EntryChange::Modified);
}

#[test]
fn ordered_list_aligns_with_lcs() {
    // `items` has no registered identity key, so LCS alignment applies.
    let live = indoc! {"
        apiVersion: v1
        kind: ConfigMap
        metadata:
          name: cm
        items:
          - alpha
          - beta
          - gamma
    "};
    let proposed = indoc! {"
        apiVersion: v1
        kind: ConfigMap
        metadata:
          name: cm
        items:
          - alpha
          - gamma
          - delta
    "};
    let d = diff(live, proposed);
    let summary: Vec<(String, EntryChange)> = d
        .entries
        .iter()
        .map(|e| (e.path.to_string(), e.change))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("items[1]".to_string(), EntryChange::Removed),
            ("items[2]".to_string(), EntryChange::Added),
        ]
    );
}

#[test]
fn symmetry_entries_are_exact_inverses() {
    let a = indoc! {"
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: web
          labels:
            tier: front
        spec:
          replicas: 3
          paused: true
    "};
    let b = indoc! {"
        apiVersion: apps/v1
        kind: Deployment
        metadata:
          name: web
        spec:
          replicas: 5
          minReadySeconds: 10
    "};
    let forward = diff(a, b);
    let backward = diff(b, a);
    assert_eq!(forward.entries.len(), backward.entries.len());

    let mut mirrored: Vec<_> = backward
        .entries
        .iter()
        .map(|e| {
            let change = match e.change {
                EntryChange::Added => EntryChange::Removed,
                EntryChange::Removed => EntryChange::Added,
                other => other,
            };
            (e.path.clone(), change, e.new_value.clone(), e.old_value.clone())
        })
        .collect();
    mirrored.sort_by(|x, y| x.0.cmp(&y.0).then(x.1.cmp(&y.1)));
    let mut forward_view: Vec<_> = forward
        .entries
        .iter()
        .map(|e| (e.path.clone(), e.change, e.old_value.clone(), e.new_value.clone()))
        .collect();
    forward_view.sort_by(|x, y| x.0.cmp(&y.0).then(x.1.cmp(&y.1)));
    sim_assert_eq!(forward_view, mirrored);
}

#[test]
fn deterministic_across_runs() {
    let d1 = diff(DEPLOY_3, DEPLOY_1);
    let d2 = diff(DEPLOY_3, DEPLOY_1);
    let s1 = serde_json::to_string(&d1).unwrap();
    let s2 = serde_json::to_string(&d2).unwrap();
    assert_eq!(s1, s2);
}

#[test]
fn added_and_removed_resources() {
    let doc = doc(DEPLOY_3, Origin::Proposed);
    let rules = KindTable::builtin().rules_for("Deployment");
    let added = diff_pair(
        &doc.identity.clone(),
        None,
        Some(&doc),
        &rules,
        &DiffLimits::default(),
    )
    .unwrap();
    assert_eq!(added.change, ResourceChange::Added);
    assert!(added.entries.is_empty());

    let removed = diff_pair(
        &doc.identity.clone(),
        Some(&doc),
        None,
        &rules,
        &DiffLimits::default(),
    )
    .unwrap();
    assert_eq!(removed.change, ResourceChange::Removed);

    assert!(diff_pair(&doc.identity.clone(), None, None, &rules, &DiffLimits::default()).is_none());
}

#[test]
fn depth_limit_truncates_instead_of_failing() {
    let live = doc(DEPLOY_3, Origin::Live);
    let proposed = doc(DEPLOY_1, Origin::Proposed);
    let rules = KindTable::builtin().rules_for("Deployment");
    let limits = DiffLimits {
        max_depth: 1,
        max_list_len: 512,
    };
    let d = diff_pair(
        &live.identity.clone(),
        Some(&live),
        Some(&proposed),
        &rules,
        &limits,
    )
    .unwrap();
    assert!(d.truncated);
    assert_eq!(d.change, ResourceChange::Modified);
}

#[test]
fn long_list_truncates() {
    let entries: String = (0..20).map(|i| format!("  - item-{i}\n")).collect();
    let live = format!(
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\nitems:\n{entries}"
    );
    let proposed = format!(
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\nitems:\n{entries}  - one-more\n"
    );
    let live = doc(&live, Origin::Live);
    let proposed = doc(&proposed, Origin::Proposed);
    let rules = KindTable::builtin().rules_for("ConfigMap");
    let limits = DiffLimits {
        max_depth: 64,
        max_list_len: 10,
    };
    let d = diff_pair(
        &live.identity.clone(),
        Some(&live),
        Some(&proposed),
        &rules,
        &limits,
    )
    .unwrap();
    assert!(d.truncated);
}
