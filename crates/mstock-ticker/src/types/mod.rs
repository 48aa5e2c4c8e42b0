/*
[INPUT]:  Venue constants, packet fields, and control frame schema
[OUTPUT]: Typed Rust structs and enums shared by the ticker
[POS]:    Data layer - type definitions
[UPDATE]: When the venue schema changes or new types are added
*/

pub mod enums;
pub mod models;
pub mod requests;

pub use enums::*;
pub use models::*;
pub use requests::*;
