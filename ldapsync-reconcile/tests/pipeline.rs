//! End-to-end manifest runs against the in-memory directory.

use std::path::Path;

use ldapsync_core::{state, Directive, Dn, Manifest, Ownership};
use ldapsync_directory::MemoryDirectory;
use ldapsync_reconcile::pipeline::{self, EntryOutcome, RefreshStatus};
use ldapsync_reconcile::{ReconcileError, Reconciler};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const MANIFEST: &str = r#"
entries:
  - dn: ou=people,dc=example,dc=com
    object_classes: [organizationalUnit]
  - dn: cn=alice,ou=people,dc=example,dc=com
    object_classes: [inetOrgPerson]
    attributes:
      - sn: Smith
      - mail: alice@example.com
      - title: eng
  - dn: cn=admins,dc=example,dc=com
    ownership: partial
    attributes:
      - member: cn=alice,ou=people,dc=example,dc=com
"#;

const ALICE: &str = "cn=alice,ou=people,dc=example,dc=com";
const ADMINS: &str = "cn=admins,dc=example,dc=com";

fn manifest(yaml: &str) -> Manifest {
    Manifest::from_yaml(yaml, Path::new("test.yaml")).expect("manifest")
}

fn directory() -> MemoryDirectory {
    MemoryDirectory::new()
        .with_entry("dc=example,dc=com", &[("dc", &["example"])])
        .with_entry(
            ADMINS,
            &[
                ("objectClass", &["groupOfNames"]),
                ("cn", &["admins"]),
                ("member", &["cn=root,dc=example,dc=com"]),
            ],
        )
}

fn labels(reports: &[pipeline::EntryReport]) -> Vec<&'static str> {
    reports.iter().map(|r| r.outcome.label()).collect()
}

#[test]
fn dry_run_changes_nothing() {
    let home = TempDir::new().expect("home");
    let mut rec = Reconciler::new(directory());

    let reports = pipeline::plan(&mut rec, home.path(), &manifest(MANIFEST)).expect("plan");

    assert_eq!(labels(&reports), vec!["would create"; 3]);
    assert!(rec.directory().mutations().is_empty());
    assert!(state::list_at(home.path()).expect("list").is_empty());
}

#[test]
fn apply_creates_then_converges() {
    let home = TempDir::new().expect("home");
    let mut rec = Reconciler::new(directory());
    let m = manifest(MANIFEST);

    let first = pipeline::apply(&mut rec, home.path(), &m, false).expect("apply");
    assert_eq!(labels(&first), vec!["created"; 3]);
    assert_eq!(state::list_at(home.path()).expect("list").len(), 3);
    let members = rec.directory().entry(ADMINS).expect("group").values("member").len();
    assert_eq!(members, 2);

    rec.directory_mut().clear_journal();
    let second = pipeline::apply(&mut rec, home.path(), &m, false).expect("apply");
    assert_eq!(labels(&second), vec!["unchanged"; 3]);
    assert!(rec.directory().mutations().is_empty());
}

#[test]
fn drift_is_planned_and_repaired() {
    let home = TempDir::new().expect("home");
    let mut rec = Reconciler::new(directory());
    let m = manifest(MANIFEST);
    pipeline::apply(&mut rec, home.path(), &m, false).expect("apply");

    rec.directory_mut().set_values(ALICE, "title", &["eng", "intern"]);

    let plan = pipeline::plan(&mut rec, home.path(), &m).expect("plan");
    assert_eq!(
        plan[1].outcome,
        EntryOutcome::WouldUpdate {
            directives: vec![Directive::replace("title", vec!["eng".into()])]
        }
    );

    pipeline::apply(&mut rec, home.path(), &m, false).expect("apply");
    let alice = rec.directory().entry(ALICE).expect("alice");
    assert_eq!(alice.values("title"), &["eng".to_string()]);
}

#[test]
fn unskipped_attribute_is_read_before_planning() {
    let home = TempDir::new().expect("home");
    let mut rec = Reconciler::new(directory());
    let skipping = manifest(
        r#"
entries:
  - dn: cn=alice,dc=example,dc=com
    object_classes: [inetOrgPerson]
    skip_attributes: [title]
    attributes:
      - sn: Smith
      - title: eng
"#,
    );
    pipeline::apply(&mut rec, home.path(), &skipping, false).expect("apply");
    rec.directory_mut()
        .set_values("cn=alice,dc=example,dc=com", "title", &["eng"]);

    let managing = manifest(
        r#"
entries:
  - dn: cn=alice,dc=example,dc=com
    object_classes: [inetOrgPerson]
    attributes:
      - sn: Smith
      - title: eng
"#,
    );
    rec.directory_mut().clear_journal();
    let reports = pipeline::apply(&mut rec, home.path(), &managing, false).expect("apply");

    assert_eq!(labels(&reports), vec!["unchanged"]);
    assert!(rec.directory().mutations().is_empty());
}

#[test]
fn undeclared_records_are_deleted() {
    let home = TempDir::new().expect("home");
    let mut rec = Reconciler::new(directory());
    pipeline::apply(&mut rec, home.path(), &manifest(MANIFEST), false).expect("apply");

    let reduced = manifest(
        r#"
entries:
  - dn: ou=people,dc=example,dc=com
    object_classes: [organizationalUnit]
"#,
    );
    let dry = pipeline::apply(&mut rec, home.path(), &reduced, true).expect("dry run");
    assert_eq!(labels(&dry), vec!["unchanged", "would delete", "would delete"]);

    let reports = pipeline::apply(&mut rec, home.path(), &reduced, false).expect("apply");
    assert_eq!(labels(&reports), vec!["unchanged", "deleted", "deleted"]);
    assert!(!rec.directory().contains(ALICE));
    let group = rec.directory().entry(ADMINS).expect("group survives");
    assert_eq!(group.values("member"), &["cn=root,dc=example,dc=com".to_string()]);
    assert_eq!(state::list_at(home.path()).expect("list").len(), 1);
}

#[test]
fn failure_aborts_and_keeps_previous_record() {
    let home = TempDir::new().expect("home");
    let mut rec = Reconciler::new(directory());
    let m = manifest(MANIFEST);
    pipeline::apply(&mut rec, home.path(), &m, false).expect("apply");
    let before = state::load_at(home.path(), &Dn::from(ALICE), Ownership::Full).expect("record");

    let changed = manifest(&MANIFEST.replace("title: eng", "title: lead"));
    rec.directory_mut().fail_next_mutation(53);
    let err = pipeline::apply(&mut rec, home.path(), &changed, false).unwrap_err();
    assert!(matches!(err, ReconcileError::Directory(_)));

    let after = state::load_at(home.path(), &Dn::from(ALICE), Ownership::Full).expect("record");
    assert_eq!(after, before);
}

#[test]
fn refresh_reports_drift_and_disappearance() {
    let home = TempDir::new().expect("home");
    let mut rec = Reconciler::new(directory());
    pipeline::apply(&mut rec, home.path(), &manifest(MANIFEST), false).expect("apply");

    rec.directory_mut().set_values(ALICE, "title", &["lead"]);
    rec.directory_mut()
        .set_values(ADMINS, "member", &["cn=root,dc=example,dc=com"]);

    let reports = pipeline::refresh(&mut rec, home.path()).expect("refresh");
    let status = |dn: &str| {
        reports
            .iter()
            .find(|r| r.dn.as_str() == dn)
            .map(|r| r.status)
    };
    assert_eq!(status(ALICE), Some(RefreshStatus::Drifted));
    assert_eq!(status(ADMINS), Some(RefreshStatus::Gone));
    assert_eq!(status("ou=people,dc=example,dc=com"), Some(RefreshStatus::Current));

    let alice = state::load_at(home.path(), &Dn::from(ALICE), Ownership::Full).expect("record");
    assert_eq!(alice.entry.attributes.values_of("title"), vec!["lead"]);
    assert!(state::find_at(home.path(), &Dn::from(ADMINS), Ownership::Partial)
        .expect("find")
        .is_none());
}

#[test]
fn destroy_removes_children_before_parents() {
    let home = TempDir::new().expect("home");
    let mut rec = Reconciler::new(directory());
    pipeline::apply(&mut rec, home.path(), &manifest(MANIFEST), false).expect("apply");

    let reports = pipeline::destroy(&mut rec, home.path()).expect("destroy");
    let order: Vec<&str> = reports.iter().map(|r| r.dn.as_str()).collect();
    assert_eq!(order, vec![ALICE, ADMINS, "ou=people,dc=example,dc=com"]);
    assert!(state::list_at(home.path()).expect("list").is_empty());
    assert!(rec.directory().contains(ADMINS));
}

#[test]
fn import_records_existing_entry() {
    let home = TempDir::new().expect("home");
    let mut rec = Reconciler::new(directory());
    let record = pipeline::import(&mut rec, home.path(), &Dn::from(ADMINS)).expect("import");
    assert_eq!(record.entry.ownership, Ownership::Full);
    assert!(state::find_at(home.path(), &Dn::from(ADMINS), Ownership::Full)
        .expect("find")
        .is_some());
}
