use bson::Bson;

/// One value reached by a read, with the index in the outermost array crossed to reach it.
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    pub value: &'a Bson,
    pub index: Option<usize>,
}

/// Result of reading a path: scalar hits, whole-array hits and missing-field bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct FieldValues<'a> {
    pub(crate) elements: Vec<Hit<'a>>,
    pub(crate) arrays: Vec<Hit<'a>>,
    pub(crate) exists: bool,
    pub(crate) plain_missing: bool,
    pub(crate) array_field_missing: bool,
    pub(crate) array_status_normal: bool,
}

impl<'a> FieldValues<'a> {
    pub(crate) fn push_leaf(&mut self, value: &'a Bson, outer: Option<usize>) {
        self.exists = true;
        if let Bson::Array(items) = value {
            for (i, item) in items.iter().enumerate() {
                self.elements.push(Hit { value: item, index: outer.or(Some(i)) });
            }
            self.arrays.push(Hit { value, index: outer });
        } else {
            self.elements.push(Hit { value, index: outer });
        }
    }

    /// Values at the path plus the items of arrays found there.
    #[must_use]
    pub fn elements(&self) -> &[Hit<'a>] {
        &self.elements
    }

    /// Arrays found at the path.
    #[must_use]
    pub fn arrays(&self) -> &[Hit<'a>] {
        &self.arrays
    }

    /// Elements followed by whole arrays.
    pub fn iter_full(&self) -> impl Iterator<Item = &Hit<'a>> {
        self.elements.iter().chain(self.arrays.iter())
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Some but not all embedded documents carried the field.
    #[must_use]
    pub fn array_field_missing(&self) -> bool {
        self.array_field_missing
    }

    /// Index out of range, or an array without documents to broadcast into.
    #[must_use]
    pub fn array_status_normal(&self) -> bool {
        self.array_status_normal
    }

    /// What `{path: null}` matches: an explicit null, or a field missing outright.
    #[must_use]
    pub fn null_or_missing(&self) -> bool {
        self.elements.iter().any(|h| matches!(h.value, Bson::Null | Bson::Undefined))
            || self.plain_missing
            || self.array_field_missing
    }

    /// Index of the first null element, if the null came from inside an array.
    #[must_use]
    pub fn null_index(&self) -> Option<usize> {
        self.elements.iter().find(|h| matches!(h.value, Bson::Null)).and_then(|h| h.index)
    }
}
