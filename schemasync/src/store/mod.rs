pub mod cache;
pub mod writer;

pub use writer::{
    FieldWrite, SemanticsEdit, apply_user_semantics, upsert_field, upsert_object, upsert_schema,
};
