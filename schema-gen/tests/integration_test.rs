use schemars::schema_for;
use ubem::bem_def::ArchetypeOverrides;
use ubem::input::BemDefRecord;

#[test]
fn test_generate_json_schema() {
    let schema = schema_for!(BemDefRecord);
    let json = serde_json::to_string_pretty(&schema).unwrap();
    assert!(json.contains("layer_thickness_lst"));
}

#[test]
fn test_generate_overrides_schema() {
    let schema = schema_for!(ArchetypeOverrides);
    assert!(serde_json::to_string_pretty(&schema).is_ok());
}
