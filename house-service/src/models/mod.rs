pub mod house;

pub use house::{check_field_names, strip_reserved, AppliedUpdate, House, RESERVED_FIELDS};
