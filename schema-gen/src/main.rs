use schemars::schema_for;
use ubem::input::BemDefRecord;

fn main() {
    let schema = schema_for!(BemDefRecord);
    println!("{}", serde_json::to_string_pretty(&schema).unwrap());
}
