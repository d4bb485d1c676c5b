//! Recipe walkthrough

use crate::common::*;

#[test]
fn test_recipe_lifecycle() {
    let (couch, client) = memory_client(&["recipes"]);
    let db = client.database("recipes").unwrap();

    let stew = db
        .new_document(Some("Fishstew"), body(json!({"servings": 4})))
        .unwrap();
    stew.set("ingredients", json!(["cod", "potatoes", "leek"]))
        .unwrap();
    stew.create().unwrap();
    assert_eq!(stew.state(), DocState::Valid);

    // A later lookup by id is the same object
    let same = db.get("Fishstew").unwrap();
    assert!(same.ptr_eq(&stew));

    same.set("servings", 6).unwrap();
    assert_eq!(stew.state(), DocState::Dirty);
    stew.update().unwrap();
    assert_eq!(stew.get_as::<u32>("servings").unwrap(), Some(6));

    stew.put_attachment("photo.jpg", "image/jpeg", vec![0xffu8, 0xd8, 0xff])
        .unwrap();
    assert_eq!(stew.revisions().unwrap().len(), 3);

    // Open the first revision as a snapshot
    let first = stew.revisions().unwrap().last().cloned().unwrap();
    let snapshot = db
        .open("Fishstew", OpenOptions::new().rev(first))
        .unwrap()
        .into_historical()
        .unwrap();
    assert_eq!(snapshot.get("servings"), Some(&json!(4)));
    assert!(snapshot.set("servings", 8).is_err());

    stew.delete().unwrap();
    assert_eq!(stew.state(), DocState::Evicted);
    assert!(db.get("Fishstew").unwrap_err().is_not_found());
    assert_eq!(couch.revision_count("recipes", "Fishstew"), 4);
}

#[test]
fn test_databases_are_isolated() {
    let (_couch, client) = memory_client(&["recipes", "menus"]);
    let recipes = client.database("recipes").unwrap();
    let menus = client.database("menus").unwrap();

    let a = recipes.new_document(Some("x"), JsonMap::new()).unwrap();
    a.create().unwrap();
    let b = menus.new_document(Some("x"), JsonMap::new()).unwrap();
    b.create().unwrap();

    assert!(!a.ptr_eq(&b));
    assert_eq!(recipes.registry_stats().active, 1);
    assert_eq!(menus.registry_stats().active, 1);
}

#[test]
fn test_missing_database() {
    let (_couch, client) = memory_client(&[]);
    let db = client.database("nowhere").unwrap();
    assert!(db.get("x").unwrap_err().is_not_found());

    let doc = db.new_document(Some("x"), JsonMap::new()).unwrap();
    assert!(doc.create().unwrap_err().is_not_found());
    assert_eq!(doc.state(), DocState::Fresh);
}

#[test]
fn test_debug_output() {
    let (_couch, client) = memory_client(&["recipes"]);
    let db = client.database("recipes").unwrap();
    let doc = db.new_document(Some("a"), JsonMap::new()).unwrap();
    assert!(format!("{:?}", doc).contains("FRESH"));
    doc.create().unwrap();
    let shown = format!("{:?}", doc);
    assert!(shown.starts_with("<Document a:1-"));
    assert!(shown.contains("VALID"));
}
