mod bson;
mod collection;
mod counter;
mod errors;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{
    ensure_election_ordinal_counter_exists, Counter, ELECTION_ORDINAL_COUNTER,
};
pub use errors::is_duplicate_key_error;
