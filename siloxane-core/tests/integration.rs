//! Round-trip tests through the in-memory hierarchy.

use siloxane_core::{
    Archive, Array, ArrayData, AttrValue, CodecError, CodecOptions, Complex, Decoder, ElementType,
    Encoder, Hierarchy, IndexMap, Key, MemoryStore, NodeKind, NodePath, Object, Opaque, Payload,
    SparseFormat, SparseMatrix, Store, Structural, Value, attribute, decode, encode,
};

fn hierarchy() -> Hierarchy<MemoryStore> {
    Hierarchy::open(MemoryStore::new()).unwrap()
}

fn roundtrip(value: &Value) -> Value {
    let h = hierarchy();
    let root = NodePath::root();
    encode(&h, &root, "v", value).unwrap();
    decode(&h, &root, "v").unwrap()
}

#[test]
fn scalars_roundtrip() {
    let values = [
        Value::Null,
        Value::from(true),
        Value::from(-42),
        Value::from(i64::MAX),
        Value::from(3.25),
        Value::from(f64::INFINITY),
        Value::Complex(Complex::new(1.0, -2.0)),
        Value::from("hello"),
        Value::from(""),
    ];
    for value in &values {
        assert_eq!(&roundtrip(value), value);
    }
}

#[test]
fn sentinel_strings_stay_strings() {
    for s in ["__NONE__", "__EMPTY__"] {
        assert_eq!(roundtrip(&Value::from(s)), Value::from(s));
        let list = Value::list([Value::from(s), Value::from(s)]);
        assert_eq!(roundtrip(&list), list);
    }
}

#[test]
fn empty_collections_keep_their_kind() {
    let values = [
        Value::list([]),
        Value::tuple([]),
        Value::set([]),
        Value::frozenset([]),
        Value::mapping::<&str>([]),
        Value::record::<&str>([]),
    ];
    for value in &values {
        assert_eq!(&roundtrip(value), value);
    }
}

#[test]
fn empty_arrays_keep_type_and_shape() {
    let array = Array::empty(ElementType::U32, vec![4, 0, 2]).unwrap();
    let back = roundtrip(&Value::NumericArray(array.clone()));
    assert_eq!(back, Value::NumericArray(array));
}

#[test]
fn flat_and_group_lists_both_roundtrip() {
    let h = hierarchy();
    let root = NodePath::root();
    let ints = Value::list([Value::from(1), Value::from(2), Value::from(3)]);
    let mixed = Value::list([Value::from(1), Value::from("two")]);

    let ints_path = encode(&h, &root, "ints", &ints).unwrap();
    let mixed_path = encode(&h, &root, "mixed", &mixed).unwrap();

    assert_eq!(h.node_kind(&ints_path).unwrap(), NodeKind::Dataset);
    assert_eq!(h.node_kind(&mixed_path).unwrap(), NodeKind::Group);
    assert_eq!(decode(&h, &root, "ints").unwrap(), ints);
    assert_eq!(decode(&h, &root, "mixed").unwrap(), mixed);
}

#[test]
fn long_sequences_keep_numeric_order() {
    let items: Vec<Value> = (0..25)
        .map(|i| {
            if i % 2 == 0 {
                Value::from(i)
            } else {
                Value::from(format!("item{i}"))
            }
        })
        .collect();
    let tuple = Value::tuple(items);
    assert_eq!(roundtrip(&tuple), tuple);
}

#[test]
fn zero_padded_positional_names_are_accepted() {
    let h = hierarchy();
    let root = NodePath::root();
    let g = h.create_group(&root, "legacy").unwrap();
    h.set_attribute(&g, attribute::DTYPE, AttrValue::from("list"))
        .unwrap();
    for (name, v) in [("key10", 10), ("key02", 2), ("key1", 1)] {
        encode(&h, &g, name, &Value::from(v)).unwrap();
    }

    assert_eq!(
        decode(&h, &root, "legacy").unwrap(),
        Value::list([Value::from(1), Value::from(2), Value::from(10)])
    );
}

#[test]
fn sets_deduplicate_and_ignore_order() {
    let set = Value::set([
        Value::from(1),
        Value::from("a"),
        Value::tuple([Value::from(1), Value::from(2)]),
    ]);
    assert_eq!(roundtrip(&set), set);

    let flat = Value::frozenset([Value::from(3.5), Value::from(1.5)]);
    assert_eq!(roundtrip(&flat), flat);
}

#[test]
fn deep_nesting_roundtrips() {
    let value = Value::mapping([
        (
            Key::from("outer"),
            Value::list([
                Value::set([Value::from("x"), Value::from("y")]),
                Value::set([Value::from("z")]),
                Value::Null,
            ]),
        ),
        (
            Key::Int(5),
            Value::mapping([(Key::from("inner"), Value::list([Value::from(1.0), Value::from(2.0)]))]),
        ),
    ]);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn non_string_keys_roundtrip() {
    let value = Value::mapping([
        (Key::Int(1), Value::from("int")),
        (Key::Int(-7), Value::from("negative")),
        (Key::Float(2.5), Value::from("float")),
        (Key::Float(3.0), Value::from("whole float")),
        (Key::Bool(true), Value::from("bool")),
        (Key::None, Value::from("none")),
        (Key::Tuple(vec![Key::Int(1), Key::from("a")]), Value::from("pair")),
        (Key::Tuple(vec![Key::Int(1)]), Value::from("single")),
        (Key::Tuple(vec![]), Value::from("unit")),
        (Key::from("one"), Value::from("string")),
        (Key::from("it's"), Value::from("quoted")),
    ]);
    let back = roundtrip(&value);
    assert_eq!(back, value);

    let Value::Mapping(entries) = back else {
        panic!("expected a mapping");
    };
    assert!(entries.contains_key(&Key::Float(3.0)));
    assert!(!entries.contains_key(&Key::from("3.0")));
}

#[test]
fn colliding_keys_fall_back_to_pickle() {
    // Int 1 and "1" are distinct keys with the same textual form.
    let value = Value::mapping([
        (Key::Int(1), Value::from("int")),
        (Key::from("1"), Value::from("str")),
        (Key::from("a/b"), Value::Null),
    ]);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn records_roundtrip() {
    let value = Value::record([
        ("name", Value::from("run")),
        ("weights", Value::list([Value::from(0.5), Value::from(0.25)])),
        ("meta", Value::record([("ok", Value::from(true))])),
    ]);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn arrays_roundtrip() {
    let arrays = [
        Array::new(vec![2, 3], ArrayData::F32(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])).unwrap(),
        Array::from_vec(ArrayData::U8(vec![0, 255])),
        Array::from_vec(ArrayData::Complex(vec![Complex::new(0.0, 1.0)])),
        Array::from_vec(ArrayData::Str(vec!["a".into(), "b".into()])),
        Array::new(vec![], ArrayData::I64(vec![7])).unwrap(),
    ];
    for array in arrays {
        let value = Value::NumericArray(array);
        assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn sparse_layouts_roundtrip() {
    let triplets = [(0, 0, 1.0), (0, 3, 2.0), (2, 1, -1.5), (1, 2, 4.0)];
    for &format in SparseFormat::all() {
        let matrix = SparseMatrix::from_triplets(format, (3, 4), triplets).unwrap();
        let back = roundtrip(&Value::SparseMatrix(matrix.clone()));

        let Value::SparseMatrix(back) = back else {
            panic!("expected a sparse matrix for {format}");
        };
        assert_eq!(back.format(), format);
        assert_eq!(back.nonzeros(), matrix.nonzeros());
        assert_eq!(back, matrix);
    }
}

#[test]
fn empty_sparse_matrix_roundtrips() {
    let matrix = SparseMatrix::from_triplets(SparseFormat::Csc, (2, 2), []).unwrap();
    assert_eq!(roundtrip(&Value::SparseMatrix(matrix.clone())), Value::SparseMatrix(matrix));
}

#[test]
fn objects_roundtrip_structurally() {
    let object = Object::new("geometry", "Segment")
        .with_field("start", Value::tuple([Value::from(0.0), Value::from(0.0)]))
        .with_field("end", Value::tuple([Value::from(1.0), Value::from(2.0)]))
        .with_field("label", Value::Null);
    let value = Value::Object(object);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn opaque_values_are_pickled() {
    let value = Value::Opaque(Opaque::with_identity("vendor", "Handle", vec![1, 2, 3]));
    let h = hierarchy();
    let root = NodePath::root();
    let path = encode(&h, &root, "o", &value).unwrap();

    assert!(matches!(h.read_payload(&path).unwrap(), Payload::Blob(_)));
    assert_eq!(
        h.get_attribute(&path, attribute::PICKLED).unwrap(),
        Some(AttrValue::Bool(true))
    );
    assert_eq!(decode(&h, &root, "o").unwrap(), value);
}

#[test]
fn pickled_nodes_decode_regardless_of_dtype() {
    let h = hierarchy();
    let root = NodePath::root();
    let value = Value::Opaque(Opaque::from_bytes(vec![4, 5]));
    let path = encode(&h, &root, "o", &value).unwrap();
    h.set_attribute(&path, attribute::DTYPE, AttrValue::from("list"))
        .unwrap();

    assert_eq!(decode(&h, &root, "o").unwrap(), value);
}

#[test]
fn unpickle_disabled_returns_raw_blob() {
    let h = hierarchy();
    let root = NodePath::root();
    let value = Value::Opaque(Opaque::with_identity("vendor", "Handle", vec![9]));
    let path = encode(&h, &root, "o", &value).unwrap();
    let Payload::Blob(blob) = h.read_payload(&path).unwrap() else {
        panic!("expected a blob");
    };

    let options = CodecOptions {
        unpickle: false,
        ..CodecOptions::default()
    };
    let decoded = Decoder::new(&h).with_options(options).decode(&root, "o").unwrap();
    assert_eq!(
        decoded,
        Value::Opaque(Opaque::with_identity("vendor", "Handle", blob))
    );
}

#[test]
fn pickling_disabled_rejects_opaque_values() {
    let h = hierarchy();
    let options = CodecOptions::from_toml_str("pickle = false").unwrap();
    let value = Value::list([Value::Opaque(Opaque::from_bytes(vec![1]))]);

    let err = Encoder::new(&h)
        .with_options(options)
        .encode(&NodePath::root(), "l", &value)
        .unwrap_err();
    assert!(matches!(err, CodecError::UnsupportedValue(_)));
}

#[test]
fn encoding_twice_replaces() {
    let h = hierarchy();
    let root = NodePath::root();
    let first = Value::mapping([("a", Value::from(1)), ("b", Value::from(2))]);
    let second = Value::mapping([("c", Value::from(3))]);

    encode(&h, &root, "m", &first).unwrap();
    let path = encode(&h, &root, "m", &second).unwrap();

    assert_eq!(h.list_child_keys(&path).unwrap(), vec!["c"]);
    assert_eq!(decode(&h, &root, "m").unwrap(), second);
    assert_eq!(h.list_child_keys(&root).unwrap(), vec!["m"]);
}

#[test]
fn missing_child_is_reported() {
    let h = hierarchy();
    let err = decode(&h, &NodePath::root(), "nonexistent").unwrap_err();
    match err {
        CodecError::MissingChild { parent, name } => {
            assert!(parent.is_root());
            assert_eq!(name, "nonexistent");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn decode_all_keeps_request_order() {
    let h = hierarchy();
    let root = NodePath::root();
    encode(&h, &root, "a", &Value::from(1)).unwrap();
    encode(&h, &root, Key::Int(2), &Value::from("two")).unwrap();

    let values = Decoder::new(&h)
        .decode_all(&root, [Key::Int(2), Key::from("a")])
        .unwrap();
    assert_eq!(values, vec![Value::from("two"), Value::from(1)]);
}

#[test]
fn date_is_rfc3339() {
    let h = hierarchy();
    let path = encode(&h, &NodePath::root(), "x", &Value::from(1)).unwrap();
    let date = h.get_attribute(&path, attribute::DATE).unwrap().unwrap();
    let text = date.as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok(), "{text}");
}

#[derive(Debug, Clone, PartialEq, Structural)]
struct Experiment {
    name: String,
    #[structural(rename = "n")]
    repetitions: u32,
    scores: Vec<f64>,
    notes: Option<String>,
    origin: Position,
    #[structural(skip)]
    cache: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Structural)]
struct Position(f64, f64);

#[derive(Debug, Clone, PartialEq, Structural)]
struct Marker;

#[test]
fn derived_types_roundtrip() {
    let archive = Archive::new(hierarchy());
    let experiment = Experiment {
        name: "baseline".into(),
        repetitions: 3,
        scores: vec![0.5, 0.75],
        notes: None,
        origin: Position(1.0, -1.0),
        cache: vec![1, 2, 3],
    };

    let path = archive.save_as("exp", &experiment).unwrap();
    let store = archive.store();
    assert_eq!(
        store.get_attribute(&path, attribute::CLASS).unwrap(),
        Some(AttrValue::from("Experiment"))
    );
    assert_eq!(
        store.get_attribute(&path, attribute::MODULE).unwrap(),
        Some(AttrValue::from(Experiment::MODULE))
    );
    assert!(store.has_child(&path, "n").unwrap());
    assert!(!store.has_child(&path, "cache").unwrap());
    assert!(store.has_child(&path.child("origin"), "_0").unwrap());

    let back: Experiment = archive.load_as("exp").unwrap();
    assert_eq!(
        back,
        Experiment {
            cache: Vec::new(),
            ..experiment
        }
    );

    archive.save_as("marker", &Marker).unwrap();
    assert_eq!(archive.load_as::<Marker>("marker").unwrap(), Marker);
}

#[test]
fn derived_type_from_wrong_class_fails() {
    let archive = Archive::new(hierarchy());
    archive.save_as("p", &Position(0.0, 1.0)).unwrap();
    let err = archive.load_as::<Marker>("p").unwrap_err();
    assert!(matches!(err, CodecError::TypeCoercion { .. }));
}

#[test]
fn pickled_objects_still_convert() {
    let options = CodecOptions {
        pickle_objects: true,
        ..CodecOptions::default()
    };
    let archive = Archive::new(hierarchy()).with_options(options);
    archive.save_as("p", &Position(2.0, 3.0)).unwrap();

    let path = archive.path().child("p");
    assert_eq!(archive.store().node_kind(&path).unwrap(), NodeKind::Dataset);
    assert_eq!(archive.load_as::<Position>("p").unwrap(), Position(2.0, 3.0));
}

#[test]
fn options_load_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("siloxane.toml");
    std::fs::write(&path, "pickle_objects = true\n").unwrap();

    let options = CodecOptions::load(&path).unwrap();
    assert!(options.pickle_objects);
    assert!(options.pickle);
}

#[test]
fn record_typed_map_roundtrip() {
    let archive = Archive::new(hierarchy());
    let mut map = IndexMap::new();
    map.insert("alpha".to_string(), vec![1i64, 2]);
    map.insert("beta".to_string(), vec![]);

    archive.save_as("m", &map).unwrap();
    let back: IndexMap<String, Vec<i64>> = archive.load_as("m").unwrap();
    assert_eq!(back, map);
}
