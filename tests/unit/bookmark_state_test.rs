//! Unit tests for the bookmark data types: the state bitmask, package
//! upserts and the update event encoding.

use obs_bookmarks::types::bookmark::*;
use obs_bookmarks::types::errors::BookmarkError;
use obs_bookmarks::types::obs::PackageFile;
use rstest::rstest;
use serde_json::json;

const API: &str = "https://api.opensuse.org";

#[rstest]
#[case(BookmarkState::OK, 0x0)]
#[case(BookmarkState::LOCAL_GONE, 0x1)]
#[case(BookmarkState::REMOTE_GONE, 0x2)]
#[case(BookmarkState::METADATA_BROKEN, 0x4)]
#[case(BookmarkState::UNKNOWN, 0x8)]
fn state_encodes_legacy_bits(#[case] state: BookmarkState, #[case] bits: u8) {
    assert_eq!(state.bits(), bits);
    assert_eq!(serde_json::to_value(state).unwrap(), json!(bits));
    assert_eq!(BookmarkState::from_bits(bits), Some(state));
}

#[test]
fn state_combines_facts() {
    let state = BookmarkState::REMOTE_GONE.union(BookmarkState::METADATA_BROKEN);
    assert!(state.remote_gone && state.metadata_broken);
    assert!(!state.is_ok());
    assert_eq!(state.bits(), 0x6);
    let back: BookmarkState = serde_json::from_value(json!(6)).unwrap();
    assert_eq!(back, state);
}

#[test]
fn state_rejects_unknown_bits() {
    assert_eq!(BookmarkState::from_bits(0x10), None);
    assert!(serde_json::from_value::<BookmarkState>(json!(0x20)).is_err());
    assert!(serde_json::from_value::<BookmarkState>(json!(-1)).is_err());
}

#[test]
fn state_defaults_to_ok() {
    assert!(BookmarkState::default().is_ok());
    let proj: ProjectBookmark =
        serde_json::from_value(json!({"apiUrl": API, "name": "devel:tools"})).unwrap();
    assert!(proj.state.is_ok());
    assert_eq!(proj.packages, None);
}

#[test]
fn refresh_behavior_defaults_to_fetch_when_missing() {
    assert_eq!(RefreshBehavior::default(), RefreshBehavior::FetchWhenMissing);
    assert_eq!(
        serde_json::from_value::<RefreshBehavior>(json!("Never")).unwrap(),
        RefreshBehavior::Never
    );
}

#[test]
fn upsert_package_adds_then_modifies() {
    let mut proj = ProjectBookmark::new(API, "devel:tools");
    let change = proj
        .upsert_package(PackageBookmark::new(API, "devel:tools", "gcc"))
        .unwrap();
    assert_eq!(change, ChangeType::Add);

    let mut updated = PackageBookmark::new(API, "devel:tools", "gcc");
    updated.title = Some("GNU compiler".to_string());
    assert_eq!(proj.upsert_package(updated).unwrap(), ChangeType::Modify);
    assert_eq!(proj.package_names(), vec!["gcc"]);
    assert_eq!(
        proj.find_package("gcc").and_then(|p| p.title.clone()).as_deref(),
        Some("GNU compiler")
    );
}

#[rstest]
#[case(API, "devel:languages")]
#[case("https://api.suse.de", "devel:tools")]
fn upsert_package_rejects_foreign_package(#[case] api_url: &str, #[case] project: &str) {
    let mut proj = ProjectBookmark::new(API, "devel:tools");
    let err = proj
        .upsert_package(PackageBookmark::new(api_url, project, "gcc"))
        .unwrap_err();
    assert!(matches!(err, BookmarkError::Mismatch(_)));
    assert_eq!(proj.packages, None, "a rejected package must not create the list");
}

#[test]
fn remove_package_reports_absence() {
    let mut proj = ProjectBookmark::new(API, "devel:tools");
    assert!(proj.remove_package("gcc").is_none());
    proj.upsert_package(PackageBookmark::new(API, "devel:tools", "gcc"))
        .unwrap();
    assert_eq!(proj.remove_package("gcc").map(|p| p.name), Some("gcc".to_string()));
    assert_eq!(proj.packages, Some(vec![]));
}

#[test]
fn without_contents_strips_file_bytes() {
    let mut file = PackageFile::new("devel:tools", "gcc", "gcc.spec");
    file.contents = Some(b"Name: gcc".to_vec());
    let mut pkg = PackageBookmark::new(API, "devel:tools", "gcc");
    pkg.files = Some(vec![file]);
    let mut proj = ProjectBookmark::new(API, "devel:tools");
    proj.upsert_package(pkg).unwrap();

    let stripped = proj.without_contents();
    let file = stripped
        .find_package("gcc")
        .and_then(|p| p.find_file("gcc.spec"))
        .unwrap();
    assert_eq!(file.contents, None);

    let encoded = serde_json::to_string(&proj).unwrap();
    assert!(!encoded.contains("contents"));
    assert!(encoded.contains("\"apiUrl\""));
    assert!(encoded.contains("\"projectName\""));
}

#[test]
fn update_event_names_changed_object() {
    let update = BookmarkUpdate {
        change_type: ChangeType::Remove,
        element: BookmarkElement::Package(PackageBookmark::new(API, "devel:tools", "gcc")),
    };
    assert_eq!(update.changed_object(), ChangedObject::Package);

    let value = serde_json::to_value(&update).unwrap();
    assert_eq!(value["changeType"], json!("Remove"));
    assert_eq!(value["element"]["kind"], json!("Package"));
    assert_eq!(value["element"]["bookmark"]["name"], json!("gcc"));
}
