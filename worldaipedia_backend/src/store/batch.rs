use serde::Serialize;
use serde_json::Value;

/// What happened to a document, as broadcast after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
}

#[derive(Debug)]
pub(crate) enum WriteOp {
    Set {
        collection: String,
        id: String,
        body: Value,
    },
    Update {
        collection: String,
        id: String,
        patch: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
    Increment {
        collection: String,
        id: String,
        field: String,
        delta: i64,
    },
    ArrayUnion {
        collection: String,
        id: String,
        field: String,
        value: Value,
        len_field: Option<String>,
    },
    ArrayRemove {
        collection: String,
        id: String,
        field: String,
        value: Value,
        len_field: Option<String>,
    },
}

/// An ordered list of write operations applied in one transaction.
/// Either every op lands or none do, and no reader observes a partial
/// batch. Field-addressing ops (`update`, `increment`, `array_*`) target
/// top-level fields of the document object and fail the whole batch when
/// the document is missing.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Create-or-replace the whole document body.
    pub fn set(&mut self, collection: impl Into<String>, id: impl Into<String>, body: Value) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.into(),
            id: id.into(),
            body,
        });
        self
    }

    /// Shallow-merge `patch` (a JSON object) into an existing document.
    pub fn update(&mut self, collection: impl Into<String>, id: impl Into<String>, patch: Value) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.into(),
            id: id.into(),
            patch,
        });
        self
    }

    pub fn delete(&mut self, collection: impl Into<String>, id: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.into(),
            id: id.into(),
        });
        self
    }

    /// Integer field += delta; a missing field counts from zero.
    pub fn increment(
        &mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        delta: i64,
    ) -> &mut Self {
        self.ops.push(WriteOp::Increment {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            delta,
        });
        self
    }

    /// Set-semantics membership add: the value is appended only when not
    /// already present.
    pub fn array_union(
        &mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        value: Value,
    ) -> &mut Self {
        self.ops.push(WriteOp::ArrayUnion {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            value,
            len_field: None,
        });
        self
    }

    /// `array_union` that also rewrites `len_field` to the array's length
    /// after the op, inside the same transaction. Counter fields mirrored
    /// this way cannot drift from the array they count.
    pub fn array_union_counted(
        &mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        value: Value,
        len_field: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(WriteOp::ArrayUnion {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            value,
            len_field: Some(len_field.into()),
        });
        self
    }

    /// Removes every occurrence of the value from the array field.
    pub fn array_remove(
        &mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        value: Value,
    ) -> &mut Self {
        self.ops.push(WriteOp::ArrayRemove {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            value,
            len_field: None,
        });
        self
    }

    pub fn array_remove_counted(
        &mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        value: Value,
        len_field: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(WriteOp::ArrayRemove {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            value,
            len_field: Some(len_field.into()),
        });
        self
    }
}
