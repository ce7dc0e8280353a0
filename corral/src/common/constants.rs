// attribute constants
pub const ID_ATTRIBUTE: &str = "id";
pub const ALT_ID_ATTRIBUTE: &str = "_id";
pub const ID_ATTRIBUTES: [&str; 2] = [ID_ATTRIBUTE, ALT_ID_ATTRIBUTE];

// json constants
pub const OID_KEY: &str = "$oid";
pub const DATE_KEY: &str = "$date";

// limit constants
pub const NO_LIMIT: usize = 0;

pub const CORRAL_VERSION: &str = env!("CARGO_PKG_VERSION");
