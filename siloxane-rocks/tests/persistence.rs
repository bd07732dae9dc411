use siloxane_core::{Archive, Array, ArrayData, Key, NodePath, Object, Value};
use siloxane_rocks::RocksStore;
use tempfile::TempDir;

fn sample() -> Value {
    Value::mapping([
        (
            Key::from("series"),
            Value::list([Value::from(1), Value::from("two"), Value::Null]),
        ),
        (
            Key::Int(7),
            Value::from(Array::new(vec![2, 2], ArrayData::F64(vec![1.0, 2.0, 3.0, 4.0])).unwrap()),
        ),
        (
            Key::from("run"),
            Value::from(Object::new("lab.runs", "Run").with_field("id", 42)),
        ),
    ])
}

#[test]
fn hierarchy_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let value = sample();

    {
        let archive = Archive::new(RocksStore::open_hierarchy(dir.path()).unwrap());
        archive.save("data", &value).unwrap();
        archive.save("scale", &Value::from(0.5)).unwrap();
    }

    let archive = Archive::new(RocksStore::open_hierarchy(dir.path()).unwrap());
    assert_eq!(archive.load("data").unwrap(), value);
    assert_eq!(archive.load("scale").unwrap(), Value::from(0.5));

    let mut paths = archive.object_paths().unwrap();
    paths.sort_by_key(|p| p.to_string());
    assert_eq!(paths, vec![NodePath::parse("/data"), NodePath::parse("/scale")]);
}

#[test]
fn removal_is_persisted() {
    let dir = TempDir::new().unwrap();

    {
        let archive = Archive::new(RocksStore::open_hierarchy(dir.path()).unwrap());
        archive.save("keep", &Value::from(true)).unwrap();
        archive.save("drop", &sample()).unwrap();
        archive.remove("drop").unwrap();
    }

    let archive = Archive::new(RocksStore::open_hierarchy(dir.path()).unwrap());
    assert!(archive.contains("keep").unwrap());
    assert!(!archive.contains("drop").unwrap());
    assert_eq!(archive.keys().unwrap(), vec![Key::from("keep")]);
}
