use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(TodoId);

/// A single row of the `todos` relation as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
}

impl Todo {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: TodoId(id),
            title: title.into(),
        }
    }
}
