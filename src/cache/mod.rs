mod lookup;

pub use self::lookup::create_redis_client;
pub use self::lookup::CacheWriter;
pub use self::lookup::LookupCache;
pub use self::lookup::{FOUND_TTL_SECS, NO_MATCH_TTL_SECS};
