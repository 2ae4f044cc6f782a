pub mod field;
pub mod table;

pub use field::{Bounds, FieldSet, STAR_BIT};
pub use table::parse_table;
