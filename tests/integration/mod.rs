// Integration test modules

#[path = "../helpers/mod.rs"]
mod helpers;

mod test_end_to_end;
