use super::*;
use serde_json::json;

fn attrs(pairs: &[(&str, serde_json::Value)]) -> Attributes {
    pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
}

fn example_mapping() -> Mapping {
    Mapping::from_pairs([("name", "Name"), ("example", "Example_Field__c")]).unwrap()
}

#[test]
fn test_convert_to_remote_renames_fields() {
    let mapping = example_mapping();
    let local = attrs(&[("name", json!("Custom object")), ("example", json!("Some sample text"))]);

    let remote = mapping.convert(Direction::ToRemote, &local).unwrap();

    assert_eq!(remote["Name"], json!("Custom object"));
    assert_eq!(remote["Example_Field__c"], json!("Some sample text"));
    assert_eq!(remote.len(), 2);
}

#[test]
fn test_convert_to_local_drops_unmapped_fields() {
    let mapping = example_mapping();
    let remote = attrs(&[
        ("Name", json!("Custom object")),
        ("Id", json!("a01000000000001")),
        ("SystemModstamp", json!("2024-01-01T00:00:00.000+0000")),
    ]);

    let local = mapping.convert(Direction::ToLocal, &remote).unwrap();

    assert_eq!(local.len(), 1);
    assert_eq!(local["name"], json!("Custom object"));
    assert!(!local.contains_key("example"));
}

#[test]
fn test_add_mappings_overrides_same_local_field() {
    let mut mapping = example_mapping();
    mapping.add_mappings([FieldMapping::new("example", "Other_Field__c")]).unwrap();

    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping.remote_field_for("example"), Some("Other_Field__c"));
    assert_eq!(mapping.remote_fields().collect::<Vec<_>>(), vec!["Name", "Other_Field__c"]);
}

#[test]
fn test_add_mappings_rejects_shared_remote_field() {
    let mut mapping = example_mapping();

    let err = mapping.add_mappings([FieldMapping::new("title", "Name")]).unwrap_err();

    assert!(matches!(err, ConfigError::DuplicateRemoteField { ref existing, .. } if existing == "name"));
    assert_eq!(mapping, example_mapping());
}

#[test]
fn test_add_mappings_is_atomic() {
    let mut mapping = example_mapping();

    let result = mapping.add_mappings([
        FieldMapping::new("status", "Status__c"),
        FieldMapping::new("", "Broken__c"),
    ]);

    assert!(result.is_err());
    assert_eq!(mapping.len(), 2);
    assert!(mapping.remote_field_for("status").is_none());
}

#[test]
fn test_converters_coerce_values() {
    let mapping = Mapping::from_fields([
        FieldMapping::new("count", "Count__c").with_converter(Converter::Integer),
        FieldMapping::new("active", "Active__c").with_converter(Converter::Boolean),
        FieldMapping::new("ratio", "Ratio__c").with_converter(Converter::Float),
        FieldMapping::new("code", "Code__c").with_converter(Converter::String),
        FieldMapping::new("seen_at", "Seen_At__c").with_converter(Converter::Timestamp),
        FieldMapping::new("born_on", "Born_On__c").with_converter(Converter::Date),
    ])
    .unwrap();

    let remote = attrs(&[
        ("Count__c", json!("42")),
        ("Active__c", json!("yes")),
        ("Ratio__c", json!("0.5")),
        ("Code__c", json!(7)),
        ("Seen_At__c", json!("2024-03-05T10:11:12.000+0000")),
        ("Born_On__c", json!("1990-07-01")),
    ]);

    let local = mapping.convert(Direction::ToLocal, &remote).unwrap();

    assert_eq!(local["count"], json!(42));
    assert_eq!(local["active"], json!(true));
    assert_eq!(local["ratio"], json!(0.5));
    assert_eq!(local["code"], json!("7"));
    assert_eq!(local["seen_at"], json!("2024-03-05T10:11:12.000Z"));
    assert_eq!(local["born_on"], json!("1990-07-01"));
}

#[test]
fn test_null_passes_through_converters() {
    let mapping = Mapping::from_fields([
        FieldMapping::new("count", "Count__c").with_converter(Converter::Integer)
    ])
    .unwrap();

    let local = mapping
        .convert(Direction::ToLocal, &attrs(&[("Count__c", serde_json::Value::Null)]))
        .unwrap();

    assert_eq!(local["count"], serde_json::Value::Null);
}

#[test]
fn test_invalid_value_is_a_conversion_error() {
    let mapping = Mapping::from_fields([
        FieldMapping::new("count", "Count__c").with_converter(Converter::Integer)
    ])
    .unwrap();

    let err = mapping
        .convert(Direction::ToLocal, &attrs(&[("Count__c", json!("forty-two"))]))
        .unwrap_err();

    assert_eq!(err.field, "Count__c");
    assert_eq!(err.target, "integer");
}

#[test]
fn test_mapping_deserializes_from_field_list() {
    let mapping: Mapping = serde_json::from_value(json!([
        { "local": "name", "remote": "Name" },
        { "local": "amount", "remote": "Amount__c", "converter": "float" }
    ]))
    .unwrap();

    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping.fields()[1].converter, Converter::Float);
}

#[test]
fn test_mapping_deserialization_validates() {
    let result: std::result::Result<Mapping, _> = serde_json::from_value(json!([
        { "local": "name", "remote": "Name" },
        { "local": "title", "remote": "Name" }
    ]));

    assert!(result.is_err());
}

#[test]
fn test_converter_from_str() {
    assert_eq!("INT".parse::<Converter>().unwrap(), Converter::Integer);
    assert!("uuid".parse::<Converter>().is_err());
}
