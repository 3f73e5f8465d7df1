/// Programmatic CLI commands. JSON arguments are Extended JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Collections,
    Drop {
        collection: String,
    },
    Insert {
        collection: String,
        /// One object or an array of objects.
        docs_json: String,
        ordered: bool,
    },
    Find {
        collection: String,
        filter_json: String,
        projection: Option<String>,
        sort: Option<String>,
        skip: u64,
        limit: i64,
        max_time_ms: Option<u64>,
    },
    Count {
        collection: String,
        filter_json: String,
    },
    Distinct {
        collection: String,
        key: String,
        filter_json: String,
    },
    Update {
        collection: String,
        filter_json: String,
        update_json: String,
        many: bool,
        upsert: bool,
        /// A JSON array of filter objects.
        array_filters: Option<String>,
    },
    Delete {
        collection: String,
        filter_json: String,
        many: bool,
    },
    Metrics,
}
