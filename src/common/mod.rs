pub mod error;
pub use error::DbError;

pub mod result;
pub use result::DbResult;

pub mod value;
pub use value::Value;

pub mod row;
pub use row::{Row, RowId};

pub mod object_key;
pub use object_key::ObjectKey;
